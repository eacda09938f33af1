//! Client for the inference server that scores and summarizes comments.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("inference server rejected the request: {0}")]
    BadRequest(String),
    #[error("inference endpoint not found: {0}")]
    NotFound(String),
    #[error("inference server internal error (status {0})")]
    Server(u16),
    #[error("unexpected inference server status {0}")]
    UnexpectedStatus(u16),
    #[error("inference server network error: {0}")]
    Network(String),
    #[error("failed to parse inference response: {0}")]
    Parse(String),
    #[error("inference response has no result")]
    EmptyInference,
}

/// A comment sent for emotion scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceComment {
    pub id: i64,
    pub content: String,
}

/// Emotion verdict for one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub id: i64,
    pub score: i64,
    pub reason: String,
    #[serde(default)]
    pub is_spam: Option<bool>,
}

/// Anything that can score and summarize comments.
#[async_trait]
pub trait CommentAnalyzer: Send + Sync {
    /// Score each comment; results may omit or reorder comments.
    async fn score_emotions(&self, comments: &[SourceComment]) -> Result<Vec<EmotionScore>, LlmError>;

    /// Summarize free text.
    async fn summarize(&self, content: &str) -> Result<String, LlmError>;
}

/// HTTP client for the inference server.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse<T> {
    inference: Option<T>,
}

impl InferenceClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build inference HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(&config.llm_api_url, config.llm_timeout)
    }

    async fn infer<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, LlmError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(url = %url, "Sending inference request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Inference request failed");
            return Err(status_error(status, detail));
        }

        let parsed: InferenceResponse<T> = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed.inference.ok_or(LlmError::EmptyInference)
    }
}

fn status_error(status: StatusCode, detail: String) -> LlmError {
    match status.as_u16() {
        400 => LlmError::BadRequest(detail),
        404 => LlmError::NotFound(detail),
        code if code >= 500 => LlmError::Server(code),
        code => LlmError::UnexpectedStatus(code),
    }
}

#[async_trait]
impl CommentAnalyzer for InferenceClient {
    async fn score_emotions(&self, comments: &[SourceComment]) -> Result<Vec<EmotionScore>, LlmError> {
        self.infer("emotion", json!({ "comments": comments })).await
    }

    async fn summarize(&self, content: &str) -> Result<String, LlmError> {
        self.infer("summary", json!({ "content": content })).await
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::{CRAWLER_ACCEPT_LANGUAGE, CRAWLER_USER_AGENT};
use crate::crawler::CrawlError;

/// Minimal GraphQL-over-HTTP client for the comic platform.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

impl GraphQlClient {
    /// Build a client that sends browser-like headers with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the referer is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(endpoint: &str, referer: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(CRAWLER_ACCEPT_LANGUAGE),
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer).context("Invalid GraphQL referer header")?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(CRAWLER_USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build GraphQL HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Build a client from the GraphQL settings in `config`.
    ///
    /// # Errors
    ///
    /// See [`GraphQlClient::new`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.graphql_url,
            &config.graphql_referer,
            config.http_timeout,
        )
    }

    /// Run `query` and decode its `data` object.
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses, GraphQL `errors` entries
    /// and undecodable payloads are all [`CrawlError::Upstream`].
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, CrawlError> {
        debug!(operation, endpoint = %self.endpoint, "Sending GraphQL request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "operationName": operation,
                "query": query,
                "variables": variables,
            }))
            .send()
            .await
            .map_err(|e| CrawlError::upstream(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(operation, status = %status, "GraphQL endpoint returned an error status");
            return Err(CrawlError::Upstream(format!(
                "{operation}: HTTP status {status}"
            )));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| CrawlError::upstream(operation, e))?;

        if !body.errors.is_empty() {
            let messages = body
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(operation, errors = %messages, "GraphQL request returned errors");
            return Err(CrawlError::Upstream(format!("{operation}: {messages}")));
        }

        body.data
            .ok_or_else(|| CrawlError::Upstream(format!("{operation}: response has no data")))
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::analysis::AnalysisError;
use crate::crawler::CrawlError;
use crate::db::ListQueryError;
use crate::llm::LlmError;

/// JSON error body: `{error_code, message, detail}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: &'static str,
    message: String,
    detail: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    /// Log `err` and hide it behind a generic 500.
    pub fn internal(context: &str, err: &anyhow::Error) -> Self {
        tracing::error!("{context}: {err:#}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error_code": self.error_code,
            "message": self.message,
            "detail": self.detail,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<CrawlError> for ApiError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::EmptyCollection(_) => {
                Self::new(StatusCode::NOT_FOUND, "empty_collection", err.to_string())
            }
            CrawlError::SeriesNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "remote_series_not_found", err.to_string())
            }
            CrawlError::NotFound { .. } => Self::not_found(err.to_string()),
            CrawlError::Upstream(_) => {
                tracing::warn!("Crawl upstream failure: {err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_error",
                    err.to_string(),
                )
            }
            CrawlError::Schema(_) => {
                tracing::error!("Crawl schema error: {err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "schema_error",
                    err.to_string(),
                )
            }
            CrawlError::Storage(e) => Self::internal("Crawl storage failure", &e),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        // Every inference failure surfaces as a validation error
        let code = match &err {
            LlmError::BadRequest(_) => "inference_bad_request",
            LlmError::NotFound(_) => "inference_not_found",
            LlmError::Server(_) => "inference_server_error",
            LlmError::UnexpectedStatus(_) => "inference_unexpected_status",
            LlmError::Network(_) => "inference_unreachable",
            LlmError::Parse(_) => "inference_invalid_response",
            LlmError::EmptyInference => "empty_inference",
        };
        tracing::warn!("Inference request failed: {err}");
        Self::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EpisodeNotFound(_) => Self::not_found(err.to_string()),
            AnalysisError::NoComments(_) => {
                Self::new(StatusCode::BAD_REQUEST, "no_comments", err.to_string())
            }
            AnalysisError::Llm(e) => e.into(),
            AnalysisError::Storage(e) => Self::internal("Analysis storage failure", &e),
        }
    }
}

impl From<ListQueryError> for ApiError {
    fn from(err: ListQueryError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_query", err.to_string())
    }
}

//! Error types for Sonar Watcher

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error (roster, schema, credentials)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the Allium API
    #[error("Allium API error {status}: {body}")]
    Provider { status: u16, body: String },

    /// Request kept hitting HTTP 429 until the retry budget ran out
    #[error("Retries exhausted for {label} after {retries} rate-limited attempts")]
    RetriesExhausted { label: String, retries: u32 },

    /// Explorer query run ended in a non-success status or timed out
    #[error("SQL query run {run_id} failed: status=\"{status}\" after {elapsed_secs}s")]
    QueryRun {
        run_id: String,
        status: String,
        elapsed_secs: u64,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error is the provider saying "slow down".
    ///
    /// The queue retries these; everything else fails fast.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Provider { status: 429, .. })
    }

    /// True for errors the poller logs quietly: the queue already
    /// burned its retry budget, there is nothing actionable per wallet.
    pub fn is_rate_limit_related(&self) -> bool {
        self.is_rate_limited() || matches!(self, AppError::RetriesExhausted { .. })
    }
}

/// Error response structure for API
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// The request itself was bad; retrying it unchanged will not help.
    fn rejected(reason: &str, details: String) -> Self {
        Self {
            status: "rejected",
            reason: reason.to_string(),
            details: Some(details),
        }
    }

    /// Something on our side or upstream broke.
    fn failed(reason: &str, details: String) -> Self {
        Self {
            status: "error",
            reason: reason.to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // Client faults
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::rejected("validation_failed", msg.clone()),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::rejected("not_found", msg.clone()),
            ),
            // Upstream faults
            AppError::Provider { status, body } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::failed(
                    "provider_error",
                    format!("upstream status {}: {}", status, body),
                ),
            ),
            AppError::Http(e) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::failed("upstream_transport_error", e.to_string()),
            ),
            AppError::RetriesExhausted { label, retries } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse::failed(
                    "retries_exhausted",
                    format!("{} after {} retries", label, retries),
                ),
            ),
            AppError::QueryRun { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse::failed("query_run_failed", self.to_string()),
            ),
            // Our faults
            AppError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::failed("configuration_error", e.to_string()),
            ),
            AppError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::failed("database_error", e.to_string()),
            ),
            AppError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::failed("io_error", e.to_string()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::failed("internal_error", msg.clone()),
            ),
        };

        tracing::error!(status = %status, error = %self, "API request failed");

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

// src/error.rs
//
// Error taxonomy for the scrape pipeline and its HTTP surface. Fetch trouble
// is retried and then downgraded to outcome data; only store unavailability
// crosses a cycle boundary, and nothing here ever takes the process down.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Transport-level failure while fetching a source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Other(String),
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }

    /// Whether another attempt could plausibly succeed. Timeouts, connect
    /// failures, 429 and 5xx are transient; everything else burns no more
    /// attempts.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Other(_) => false,
        }
    }
}

/// The article store could not be reached. Fatal to the current cycle only:
/// the cycle aborts cleanly and the next tick retries from scratch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the HTTP read surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

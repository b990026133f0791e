//! API error handling
//!
//! Every failure leaves the server as `{"error": "<message>"}`. Backend
//! messages are passed through unless `expose_error_details` is off.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::inference::ProviderError;

const GENERIC_FAILURE: &str = "Failed to process request";

#[derive(Debug)]
pub enum ApiError {
    /// The request itself is unusable.
    BadRequest(String),
    /// The active provider is misconfigured (no credential).
    Configuration(String),
    /// The backend failed: non-success status, network or undecodable body.
    Upstream(String),
}

impl ApiError {
    /// Maps a reply-call failure, optionally hiding the backend's message.
    pub fn from_provider(err: ProviderError, expose_details: bool) -> Self {
        let message = if expose_details {
            err.to_string()
        } else {
            GENERIC_FAILURE.to_string()
        };
        match err {
            ProviderError::Config(_) => ApiError::Configuration(message),
            ProviderError::Api { .. } | ProviderError::Network(_) | ProviderError::Parse(_) => {
                ApiError::Upstream(message)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Configuration(msg) | ApiError::Upstream(msg) => msg,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            ApiError::Upstream(msg) => write!(f, "Upstream error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

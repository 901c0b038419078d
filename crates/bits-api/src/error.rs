//! API error type and JSON error response formatting.
//!
//! Every failure is rendered as `{"error": code, "message": text}` with a
//! matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use bits_chat::ChatError;
use bits_core::error::BitsError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "bad_request").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid input.
    BadRequest(String),
    /// 429 - the session queue is full.
    TooManyRequests(String),
    /// 500
    Internal(String),
    /// 503 - the session worker is gone.
    ServiceUnavailable(String),
    /// 504 - a backend call ran past its timeout.
    GatewayTimeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_requests", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::QueueFull(_) => ApiError::TooManyRequests(err.to_string()),
            ChatError::SessionClosed => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::Timeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BitsError> for ApiError {
    fn from(err: BitsError) -> Self {
        match &err {
            BitsError::Config(msg) => ApiError::BadRequest(msg.clone()),
            BitsError::Timeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            BitsError::QueueFull { .. } => ApiError::TooManyRequests(err.to_string()),
            BitsError::ShuttingDown => ApiError::ServiceUnavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error body and maps
//! [`StrataError`] variants onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use strata_core::error::StrataError;

/// Message returned whenever text search has no embedder to use.
pub const EMBEDDER_UNAVAILABLE_MESSAGE: &str = "Embedding model not available";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed query, vector, or filter.
    BadRequest(String, Option<serde_json::Value>),
    /// 404 Not Found - store directory has no index.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - embedding model not loaded.
    ServiceUnavailable(String),
    /// 504 Gateway Timeout - embedding took too long.
    GatewayTimeout(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into(), None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg, details) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg, details)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg, None)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StrataError> for ApiError {
    fn from(err: StrataError) -> Self {
        match &err {
            StrataError::InvalidQuery(_) => ApiError::bad_request(err.to_string()),
            StrataError::DimensionMismatch { expected, actual } => ApiError::BadRequest(
                err.to_string(),
                Some(serde_json::json!({ "expected": expected, "actual": actual })),
            ),
            StrataError::EmbedderUnavailable(_) => {
                ApiError::ServiceUnavailable(EMBEDDER_UNAVAILABLE_MESSAGE.to_string())
            }
            StrataError::EmbedderTimeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            StrataError::StoreNotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StrataError::InvalidQuery("x".into()), StatusCode::BAD_REQUEST),
            (
                StrataError::DimensionMismatch {
                    expected: 2,
                    actual: 3,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                StrataError::EmbedderUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StrataError::EmbedderTimeout { timeout_ms: 10 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (StrataError::StoreNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                StrataError::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_unavailable_message_is_fixed() {
        match ApiError::from(StrataError::EmbedderUnavailable("model.onnx missing".into())) {
            ApiError::ServiceUnavailable(msg) => assert_eq!(msg, EMBEDDER_UNAVAILABLE_MESSAGE),
            other => panic!("unexpected mapping {:?}", other),
        }
    }
}

//! Unified error handling for the backend API.
//!
//! Handlers return [`ApiResult`] and use `?` freely; the `IntoResponse`
//! implementation picks the status code and body.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Store failure or anything unexpected
    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No valid session on a protected route
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An external service call failed. The message is passed to the caller verbatim.
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Not logged in".to_string())
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            ApiError::Upstream(msg) => {
                tracing::error!("Upstream service error: {}", msg);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    msg.clone(),
                )
                    .into_response();
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_upstream_error_is_plain_text_500() {
        let response = ApiError::upstream("connection refused").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "connection refused");
    }

    #[tokio::test]
    async fn test_unauthorized_is_json_401() {
        let response = ApiError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "Not logged in");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_bad_request_keeps_message() {
        let response = ApiError::bad_request("category must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response)
            .await
            .contains("category must not be empty"));
    }
}

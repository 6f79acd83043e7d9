//! Error types for the HTTP surface
//!
//! Every failure renders as `{success: false, error, timestamp}`. Upstream
//! failures map to fixed messages that never carry the request URL.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::rate_limit::RateDecision;
use crate::upstream::UpstreamError;

// == Api Error Enum ==
/// Unified error type for route handlers and middleware.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed caller parameter
    #[error("{0}")]
    Validation(String),

    /// Local policy rejection; never reaches upstream
    #[error("Rate limit exceeded")]
    RateLimited(Box<RateDecision>),

    /// Upstream failure after broker recovery was attempted
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            ApiError::RateLimited(decision) => {
                let retry_after = decision.retry_after.unwrap_or(1);
                let body = Json(json!({
                    "success": false,
                    "error": "Rate limit exceeded",
                    "message": decision.message,
                    "retryAfter": retry_after,
                    "limit": decision.limit,
                    "remaining": 0,
                    "resetTime": decision.reset_time_secs(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            other => {
                let message = match &other {
                    ApiError::Upstream(UpstreamError::NotConfigured) => {
                        "API key is not configured".to_string()
                    }
                    _ => other.to_string(),
                };
                (status, Json(ErrorResponse::new(message))).into_response()
            }
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_status_codes() {
        let decision = RateDecision {
            admitted: false,
            policy: "youtube".to_string(),
            limit: 10,
            remaining: 0,
            reset_time: 0,
            retry_after: Some(30),
            message: String::new(),
        };
        let test_cases = vec![
            (ApiError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (ApiError::RateLimited(Box::new(decision)), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Upstream(UpstreamError::NotConfigured), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Upstream(UpstreamError::QuotaOrAuth), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.into_response().status(), expected_status);
        }
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = ApiError::Validation("Search query is required".to_string()).into_response();
        let json = body_json(response).await;

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Search query is required");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_upstream_message_is_stable() {
        let response = ApiError::from(UpstreamError::QuotaOrAuth).into_response();
        let json = body_json(response).await;
        assert_eq!(json["error"], "YouTube API quota exceeded or API key invalid");
    }

    #[tokio::test]
    async fn test_rate_limited_carries_retry_after() {
        let decision = RateDecision {
            admitted: false,
            policy: "youtube".to_string(),
            limit: 10,
            remaining: 0,
            reset_time: 1_700_000_000_001,
            retry_after: Some(42),
            message: "Too many".to_string(),
        };
        let response = ApiError::RateLimited(Box::new(decision)).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let json = body_json(response).await;
        assert_eq!(json["retryAfter"], 42);
        assert_eq!(json["limit"], 10);
        assert_eq!(json["message"], "Too many");
        assert_eq!(json["resetTime"], 1_700_000_001u64);
    }

    #[tokio::test]
    async fn test_not_configured_message() {
        let response = ApiError::from(UpstreamError::NotConfigured).into_response();
        let json = body_json(response).await;
        assert_eq!(json["error"], "API key is not configured");
    }
}

//! Admission middleware: per-client rate limiting and slow-down.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::handlers::AppState;
use crate::error::ApiError;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// State for one [`rate_limit`] layer: the app plus the policy it enforces.
#[derive(Clone)]
pub struct PolicyGuard {
    pub state: AppState,
    pub policy: &'static str,
}

impl PolicyGuard {
    pub fn new(state: AppState, policy: &'static str) -> Self {
        Self { state, policy }
    }
}

/// Rejects with 429 once the client exhausts the guard's policy.
///
/// Admitted responses carry `X-RateLimit-*` headers, the reset as Unix
/// seconds. When several layers stack, the innermost (most specific)
/// policy's headers are kept.
pub async fn rate_limit(
    State(guard): State<PolicyGuard>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request);
    let decision = guard
        .state
        .rate_limiter
        .check_and_record(guard.policy, &client)
        .await;

    if !decision.admitted {
        return ApiError::RateLimited(Box::new(decision)).into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    set_if_absent(headers, RATE_LIMIT_LIMIT_HEADER, decision.limit.into());
    set_if_absent(headers, RATE_LIMIT_REMAINING_HEADER, decision.remaining.into());
    set_if_absent(headers, RATE_LIMIT_RESET_HEADER, decision.reset_time_secs().into());
    response
}

/// Delays the request once the client passes the slow-down threshold.
pub async fn slow_down(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);
    let delay = state.rate_limiter.slow_down(&client).await;

    if !delay.is_zero() {
        debug!(client = %client, delay_ms = delay.as_millis() as u64, "Slowing down client");
        tokio::time::sleep(delay).await;
    }

    next.run(request).await
}

fn set_if_absent(headers: &mut HeaderMap, name: &'static str, value: HeaderValue) {
    headers
        .entry(HeaderName::from_static(name))
        .or_insert(value);
}

/// Client identifier: first `X-Forwarded-For` hop, `X-Real-IP`, the peer
/// address, or `"unknown"`.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first_ip.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    let extensions = request.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| extensions.get::<SocketAddr>().copied())
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> Request {
        axum::http::Request::builder()
            .uri("/api/search")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut req = request();
        req.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        req.headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_real_ip() {
        let mut req = request();
        req.headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut req = request();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));

        assert_eq!(client_ip(&req), "192.0.2.1");
    }

    #[test]
    fn test_client_ip_unknown() {
        assert_eq!(client_ip(&request()), "unknown");
    }

    #[test]
    fn test_set_if_absent_keeps_inner_value() {
        let mut headers = HeaderMap::new();
        set_if_absent(&mut headers, RATE_LIMIT_LIMIT_HEADER, 10u32.into());
        set_if_absent(&mut headers, RATE_LIMIT_LIMIT_HEADER, 100u32.into());

        assert_eq!(headers[RATE_LIMIT_LIMIT_HEADER], "10");
    }
}

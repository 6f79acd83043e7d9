//! API Handlers
//!
//! HTTP request handlers for each proxy endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::broker::{Broker, BrokerResponse, Operation};
use crate::cache::{CacheStore, SharedCache};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    ClearCacheRequest, ClearCacheResponse, DataEnvelope, HealthResponse, LiveStreamsQuery,
    SearchQuery, ServicesHealth, StatsData, StatsResponse, YoutubeHealth,
};
use crate::rate_limit::RateLimiter;
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamSettings};

/// `HIT` when the body came from the cache (fresh or stale), else `MISS`.
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
/// `API`, `CACHE` or `STALE_CACHE`.
pub const DATA_SOURCE_HEADER: &str = "x-data-source";

/// Application state shared across all handlers.
///
/// Every service is constructed once at startup and handed to the router;
/// nothing lives in module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub broker: Arc<Broker>,
}

impl AppState {
    pub fn new(cache: SharedCache, rate_limiter: Arc<RateLimiter>, broker: Arc<Broker>) -> Self {
        Self {
            cache,
            rate_limiter,
            broker,
        }
    }

    /// Builds the cache, limiter, upstream client and broker from `config`.
    pub fn from_config(config: &Config) -> std::result::Result<Self, UpstreamError> {
        let cache = SharedCache::new(CacheStore::new(config.default_ttl, config.rate_limit_ttl));
        let client = Arc::new(UpstreamClient::new(UpstreamSettings::from_config(config))?);
        let rate_limiter = Arc::new(RateLimiter::with_defaults(cache.clone()));
        let broker = Arc::new(Broker::from_config(cache.clone(), client, config));
        Ok(Self::new(cache, rate_limiter, broker))
    }
}

/// Envelope plus the cache provenance headers.
fn data_response(response: BrokerResponse) -> Response {
    let cache_status = if response.source.is_cached() {
        "HIT"
    } else {
        "MISS"
    };
    let source = response.source.as_str();
    (
        [
            (CACHE_STATUS_HEADER, cache_status),
            (DATA_SOURCE_HEADER, source),
        ],
        Json(DataEnvelope::from(response)),
    )
        .into_response()
}

/// Rejects blank path ids.
fn require_id(id: &str, what: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::Validation(format!("{} ID is required", what)));
    }
    Ok(id.to_string())
}

// == Data Routes ==
/// Handler for GET /api/live-streams
pub async fn live_streams_handler(
    State(state): State<AppState>,
    Query(query): Query<LiveStreamsQuery>,
) -> Result<Response> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::Validation(error_msg));
    }

    let response = state
        .broker
        .fetch(Operation::LiveStreams, query.into_params())
        .await?;
    Ok(data_response(response))
}

/// Handler for GET /api/search
pub async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::Validation(error_msg));
    }

    let response = state
        .broker
        .fetch(Operation::Search, query.into_params())
        .await?;
    Ok(data_response(response))
}

/// Handler for GET /api/channel/:channel_id
pub async fn channel_handler(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Response> {
    let channel_id = require_id(&channel_id, "Channel")?;
    let response = state
        .broker
        .fetch_by_id(Operation::Channel, &channel_id)
        .await?;
    Ok(data_response(response))
}

/// Handler for GET /api/video/:video_id
pub async fn video_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Response> {
    let video_id = require_id(&video_id, "Video")?;
    let response = state.broker.fetch_by_id(Operation::Video, &video_id).await?;
    Ok(data_response(response))
}

/// GET /api/channel without an id
pub async fn missing_channel_id_handler() -> ApiError {
    ApiError::Validation("Channel ID is required".to_string())
}

/// GET /api/video without an id
pub async fn missing_video_id_handler() -> ApiError {
    ApiError::Validation("Video ID is required".to_string())
}

// == Service Routes ==
/// Handler for GET /api/health
///
/// Runs the upstream connectivity self-test when a key is configured.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let client = state.broker.client();
    let youtube = YoutubeHealth {
        api_key_configured: client.is_configured(),
        connection_test: client.test_connection().await,
    };

    Json(HealthResponse::new(ServicesHealth {
        youtube,
        cache: state.cache.stats().await,
        rate_limiting: state.rate_limiter.stats().await,
    }))
}

/// Handler for GET /api/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(StatsData {
        cache: state.cache.stats().await,
        rate_limiting: state.rate_limiter.stats().await,
        youtube: state.broker.client().stats(),
        broker: state.broker.stats(),
    }))
}

/// Handler for POST /api/cache/clear
///
/// The body is optional; an empty or missing `endpoint` clears everything.
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ClearCacheResponse>> {
    let endpoint = parse_clear_body(&headers, &body)?
        .endpoint
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    let removed = state.broker.clear_cache(endpoint.as_deref()).await;
    info!(endpoint = endpoint.as_deref().unwrap_or("all"), removed, "Cache clear requested");

    Ok(Json(ClearCacheResponse::new(endpoint.as_deref(), removed)))
}

/// Only an empty body means "clear everything"; anything else must be a
/// JSON object sent as JSON.
fn parse_clear_body(headers: &HeaderMap, body: &Bytes) -> Result<ClearCacheRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ClearCacheRequest::default());
    }

    if !has_json_content_type(headers) {
        return Err(ApiError::Validation(
            "Expected request with `Content-Type: application/json`".to_string(),
        ));
    }

    Json::<ClearCacheRequest>::from_bytes(body)
        .map(|Json(req)| req)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| {
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
}

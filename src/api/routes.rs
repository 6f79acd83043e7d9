//! API Routes
//!
//! Configures the Axum router with every proxy endpoint and its admission
//! layers.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    channel_handler, clear_cache_handler, health_handler, live_streams_handler,
    missing_channel_id_handler, missing_video_id_handler, search_handler, stats_handler,
    video_handler, AppState,
};
use super::middleware::{rate_limit, slow_down, PolicyGuard};
use crate::rate_limit::policy::{GENERAL, STRICT, YOUTUBE};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/live-streams`, `/api/search`, `/api/channel/:channel_id`,
///   `/api/video/:video_id` - upstream-backed, `youtube` policy
/// - `POST /api/cache/clear` - `strict` policy
/// - `GET /api/health`, `/api/stats`
///
/// Every `/api` route also passes the slow-down layer and the `general`
/// policy.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upstream_routes = Router::new()
        .route("/live-streams", get(live_streams_handler))
        .route("/search", get(search_handler))
        .route("/channel", get(missing_channel_id_handler))
        .route("/channel/", get(missing_channel_id_handler))
        .route("/channel/:channel_id", get(channel_handler))
        .route("/video", get(missing_video_id_handler))
        .route("/video/", get(missing_video_id_handler))
        .route("/video/:video_id", get(video_handler))
        .route_layer(from_fn_with_state(
            PolicyGuard::new(state.clone(), YOUTUBE),
            rate_limit,
        ));

    let admin_routes = Router::new()
        .route("/cache/clear", post(clear_cache_handler))
        .route_layer(from_fn_with_state(
            PolicyGuard::new(state.clone(), STRICT),
            rate_limit,
        ));

    // Layers added later run first: slow-down, then general, then the
    // route-specific policy.
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .merge(upstream_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            PolicyGuard::new(state.clone(), GENERAL),
            rate_limit,
        ))
        .route_layer(from_fn_with_state(state.clone(), slow_down));

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

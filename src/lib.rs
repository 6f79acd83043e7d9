//! Gaming News Proxy - a caching, rate-limited gateway to the YouTube Data API
//!
//! Serves live streams, search results, channels and videos through a
//! partitioned in-memory TTL cache, with per-client admission control and
//! stale fallback when the upstream fails.

pub mod api;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::ApiError;
pub use tasks::spawn_cleanup_task;

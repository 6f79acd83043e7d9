//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::broker::Operation;

/// Default upstream endpoint.
pub const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Upstream API credential; the server still runs without it
    pub youtube_api_key: Option<String>,
    /// Upstream API root
    pub youtube_base_url: String,
    /// Per-attempt upstream timeout in seconds
    pub request_timeout: u64,
    /// Retries after the first upstream attempt
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Default TTL in seconds for the api partition
    pub default_ttl: u64,
    /// Default TTL in seconds for the rate-limit partition
    pub rate_limit_ttl: u64,
    pub live_streams_ttl: u64,
    pub search_ttl: u64,
    pub channel_ttl: u64,
    pub video_ttl: u64,
    /// Sweep interval in seconds for the api partition
    pub cleanup_interval: u64,
    /// Sweep interval in seconds for the rate-limit partition
    pub rate_limit_cleanup_interval: u64,
    /// Seconds an expired api entry is kept for stale fallback
    pub stale_retention: u64,
    /// Operations allowed to serve stale data when upstream fails
    pub stale_fallback: Vec<Operation>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `YOUTUBE_API_KEY` - Upstream credential (default: unset)
    /// - `YOUTUBE_BASE_URL` - Upstream API root
    /// - `REQUEST_TIMEOUT` - Upstream timeout in seconds (default: 10)
    /// - `MAX_RETRIES` - Retries on transient failures (default: 3)
    /// - `RETRY_DELAY_MS` - Base backoff in milliseconds (default: 1000)
    /// - `DEFAULT_TTL` / `RATE_LIMIT_TTL` - Partition default TTLs (300 / 60)
    /// - `LIVE_STREAMS_TTL`, `SEARCH_TTL`, `CHANNEL_TTL`, `VIDEO_TTL` - Per-operation TTLs
    /// - `CLEANUP_INTERVAL` / `RATE_LIMIT_CLEANUP_INTERVAL` - Sweep intervals (60 / 10)
    /// - `STALE_RETENTION` - Grace before expired api entries are swept (default: 600)
    /// - `STALE_FALLBACK` - Comma separated operations, e.g. `live_streams,search`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("PORT", defaults.server_port),
            youtube_api_key: env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            youtube_base_url: env::var("YOUTUBE_BASE_URL").unwrap_or(defaults.youtube_base_url),
            request_timeout: parse_env("REQUEST_TIMEOUT", defaults.request_timeout),
            max_retries: parse_env("MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: parse_env("RETRY_DELAY_MS", defaults.retry_delay_ms),
            default_ttl: parse_env("DEFAULT_TTL", defaults.default_ttl),
            rate_limit_ttl: parse_env("RATE_LIMIT_TTL", defaults.rate_limit_ttl),
            live_streams_ttl: parse_env("LIVE_STREAMS_TTL", defaults.live_streams_ttl),
            search_ttl: parse_env("SEARCH_TTL", defaults.search_ttl),
            channel_ttl: parse_env("CHANNEL_TTL", defaults.channel_ttl),
            video_ttl: parse_env("VIDEO_TTL", defaults.video_ttl),
            cleanup_interval: parse_env("CLEANUP_INTERVAL", defaults.cleanup_interval),
            rate_limit_cleanup_interval: parse_env(
                "RATE_LIMIT_CLEANUP_INTERVAL",
                defaults.rate_limit_cleanup_interval,
            ),
            stale_retention: parse_env("STALE_RETENTION", defaults.stale_retention),
            stale_fallback: env::var("STALE_FALLBACK")
                .map(|raw| parse_operations(&raw))
                .unwrap_or(defaults.stale_fallback),
        }
    }

    /// TTL in seconds for one operation.
    pub fn ttl_for(&self, operation: Operation) -> u64 {
        match operation {
            Operation::LiveStreams => self.live_streams_ttl,
            Operation::Search => self.search_ttl,
            Operation::Channel => self.channel_ttl,
            Operation::Video => self.video_ttl,
        }
    }

    /// Stale retention grace in milliseconds, clamped instead of overflowing.
    pub fn stale_retention_ms(&self) -> u64 {
        self.stale_retention.saturating_mul(1000)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            youtube_api_key: None,
            youtube_base_url: DEFAULT_YOUTUBE_BASE_URL.to_string(),
            request_timeout: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
            default_ttl: 300,
            rate_limit_ttl: 60,
            live_streams_ttl: 300,
            search_ttl: 600,
            channel_ttl: 1800,
            video_ttl: 900,
            cleanup_interval: 60,
            rate_limit_cleanup_interval: 10,
            stale_retention: 600,
            stale_fallback: Operation::ALL.to_vec(),
        }
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Unknown names are skipped.
fn parse_operations(raw: &str) -> Vec<Operation> {
    raw.split(',')
        .filter_map(|name| name.trim().parse::<Operation>().ok())
        .collect()
}

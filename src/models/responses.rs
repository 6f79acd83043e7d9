//! Response DTOs for the proxy API
//!
//! Every body carries `success` and a timestamp; data routes wrap the
//! upstream payload in [`DataEnvelope`].

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::broker::{BrokerResponse, BrokerStats};
use crate::cache::CacheReport;
use crate::rate_limit::RateLimitStats;
use crate::upstream::UpstreamStats;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// == Data Envelope ==
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Served from the cache, fresh or stale
    pub cached: bool,
    pub stale: bool,
    pub timestamp: String,
    pub request_id: String,
    /// Upstream failure that forced a stale answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
}

/// Body for the data routes (live streams, search, channel, video)
#[derive(Debug, Clone, Serialize)]
pub struct DataEnvelope {
    pub success: bool,
    pub data: Value,
    pub meta: ResponseMeta,
}

impl From<BrokerResponse> for DataEnvelope {
    fn from(response: BrokerResponse) -> Self {
        Self {
            success: true,
            meta: ResponseMeta {
                cached: response.source.is_cached(),
                stale: response.source.is_stale(),
                timestamp: now_rfc3339(),
                request_id: Uuid::new_v4().to_string(),
                stale_reason: response.stale_reason,
            },
            data: response.data,
        }
    }
}

// == Health ==
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeHealth {
    pub api_key_configured: bool,
    pub connection_test: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesHealth {
    pub youtube: YoutubeHealth,
    pub cache: CacheReport,
    pub rate_limiting: RateLimitStats,
}

/// Response body for `GET /api/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    /// "healthy" when the upstream answers, "degraded" otherwise
    pub status: String,
    pub timestamp: String,
    pub services: ServicesHealth,
}

impl HealthResponse {
    pub fn new(services: ServicesHealth) -> Self {
        let status = if services.youtube.connection_test {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            success: true,
            status: status.to_string(),
            timestamp: now_rfc3339(),
            services,
        }
    }
}

// == Stats ==
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub cache: CacheReport,
    pub rate_limiting: RateLimitStats,
    pub youtube: UpstreamStats,
    pub broker: BrokerStats,
}

/// Response body for `GET /api/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: StatsData,
    pub timestamp: String,
}

impl StatsResponse {
    pub fn new(data: StatsData) -> Self {
        Self {
            success: true,
            data,
            timestamp: now_rfc3339(),
        }
    }
}

// == Cache Clear ==
/// Response body for `POST /api/cache/clear`
#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub message: String,
    pub removed: usize,
    pub timestamp: String,
}

impl ClearCacheResponse {
    pub fn new(endpoint: Option<&str>, removed: usize) -> Self {
        let message = match endpoint {
            Some(endpoint) => format!("Cache cleared for endpoint: {}", endpoint),
            None => "All cache cleared".to_string(),
        };
        Self {
            success: true,
            message,
            removed,
            timestamp: now_rfc3339(),
        }
    }
}

// == Errors ==
/// Error body for every failure except rate limiting
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            timestamp: now_rfc3339(),
        }
    }
}

//! Request and response models for the proxy API

pub mod requests;
pub mod responses;

pub use requests::{ClearCacheRequest, LiveStreamsQuery, SearchQuery, MAX_RESULTS_LIMIT};
pub use responses::{
    ClearCacheResponse, DataEnvelope, ErrorResponse, HealthResponse, ResponseMeta,
    ServicesHealth, StatsData, StatsResponse, YoutubeHealth,
};

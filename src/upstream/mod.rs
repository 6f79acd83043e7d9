//! Upstream Module
//!
//! HTTP client for the external video platform API.

mod backoff;
mod client;
mod error;

pub use backoff::RetryPolicy;
pub use client::{Params, UpstreamClient, UpstreamSettings, UpstreamStats, USER_AGENT};
pub use error::UpstreamError;

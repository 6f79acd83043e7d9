//! Rate Limiting Module
//!
//! Per-client admission control over named fixed-window policies, with a
//! gradual slow-down layer in front of hard rejection.

mod limiter;
pub mod policy;
mod window;

#[cfg(test)]
mod property_tests;

pub use limiter::{PolicyStats, RateDecision, RateLimitStats, RateLimiter, RemainingInfo};
pub use policy::{RateLimitPolicy, SlowDownPolicy};
pub use window::RateWindow;

//! Rate-limit policies.
//!
//! The set of policies is fixed at startup. Lookups for unknown names fall
//! back to [`GENERAL`].

use std::time::Duration;

use serde::Serialize;

/// Name of the catch-all policy.
pub const GENERAL: &str = "general";
/// Policy guarding routes that hit the upstream API.
pub const YOUTUBE: &str = "youtube";
/// Policy for administrative routes.
pub const STRICT: &str = "strict";

// == Fixed Window Policy ==
/// A named request budget over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub name: String,
    pub window_ms: u64,
    pub max_requests: u32,
    /// Human readable text returned with a 429
    pub message: String,
}

impl RateLimitPolicy {
    pub fn new(
        name: impl Into<String>,
        window_ms: u64,
        max_requests: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            window_ms,
            max_requests,
            message: message.into(),
        }
    }

    /// 100 requests per 15 minutes.
    pub fn general() -> Self {
        Self::new(
            GENERAL,
            15 * 60 * 1000,
            100,
            "Too many requests from this IP, please try again later.",
        )
    }

    /// 10 requests per minute.
    pub fn youtube() -> Self {
        Self::new(
            YOUTUBE,
            60 * 1000,
            10,
            "Too many YouTube API requests. Please try again in a minute.",
        )
    }

    /// 20 requests per 5 minutes.
    pub fn strict() -> Self {
        Self::new(
            STRICT,
            5 * 60 * 1000,
            20,
            "Too many API requests. Please try again later.",
        )
    }

    /// The startup policy set.
    pub fn defaults() -> Vec<Self> {
        vec![Self::general(), Self::youtube(), Self::strict()]
    }

    /// Window TTL in whole seconds, rounded up.
    pub fn window_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }
}

// == Slow Down Policy ==
/// Linear backpressure: past `delay_after` requests in the window, each
/// further request waits `delay_ms` longer than the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowDownPolicy {
    pub window_ms: u64,
    pub delay_after: u32,
    pub delay_ms: u64,
}

impl SlowDownPolicy {
    /// Delay owed by the `count`-th request inside the window.
    pub fn delay_for(&self, count: usize) -> Duration {
        let over = (count as u64).saturating_sub(self.delay_after as u64);
        Duration::from_millis(over.saturating_mul(self.delay_ms))
    }

    pub fn window_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }
}

impl Default for SlowDownPolicy {
    /// After 50 requests per 15 minutes, add 500 ms per request.
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            delay_after: 50,
            delay_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_set() {
        let names: Vec<String> = RateLimitPolicy::defaults()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec![GENERAL, YOUTUBE, STRICT]);
    }

    #[test]
    fn test_window_secs_rounds_up() {
        let policy = RateLimitPolicy::new("p", 1_500, 1, "");
        assert_eq!(policy.window_secs(), 2);
        assert_eq!(RateLimitPolicy::youtube().window_secs(), 60);
    }

    #[test]
    fn test_slow_down_is_linear() {
        let policy = SlowDownPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(50), Duration::ZERO);
        assert_eq!(policy.delay_for(51), Duration::from_millis(500));
        assert_eq!(policy.delay_for(53), Duration::from_millis(1_500));
    }
}

//! Per-client request window.

use serde::{Deserialize, Serialize};

/// Timestamps (Unix ms) of admitted requests for one (policy, client) pair.
///
/// Kept in arrival order. Stored as JSON in the rate-limit cache partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    pub requests: Vec<u64>,
}

impl RateWindow {
    /// Drops timestamps at or before `now - window_ms`.
    ///
    /// The window is inclusive of `now` and exclusive of its lower edge.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) {
        let window_start = now_ms.saturating_sub(window_ms);
        self.requests.retain(|&t| t > window_start);
    }

    pub fn record(&mut self, now_ms: u64) {
        self.requests.push(now_ms);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// When the oldest timestamp leaves the window (Unix ms).
    pub fn reset_time(&self, now_ms: u64, window_ms: u64) -> u64 {
        self.requests.first().copied().unwrap_or(now_ms) + window_ms
    }

    /// Whole seconds until the oldest timestamp leaves the window, at least 1.
    pub fn retry_after_secs(&self, now_ms: u64, window_ms: u64) -> u64 {
        let wait_ms = self.reset_time(now_ms, window_ms).saturating_sub(now_ms);
        wait_ms.div_ceil(1000).max(1)
    }
}

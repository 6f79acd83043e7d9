//! Rate Limiter
//!
//! Fixed-window admission per (policy, client) plus a slow-down layer. Windows
//! live in the rate-limit partition of the shared cache with a TTL equal to
//! the window size, so idle clients are swept automatically.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheStore, Partition, SharedCache};
use crate::rate_limit::policy::GENERAL;
use crate::rate_limit::{RateLimitPolicy, RateWindow, SlowDownPolicy};

// == Decision Types ==
/// Outcome of [`RateLimiter::check_and_record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub admitted: bool,
    /// Policy that was actually applied
    pub policy: String,
    pub limit: u32,
    pub remaining: u32,
    /// When the oldest request leaves the window (Unix ms)
    pub reset_time: u64,
    /// Seconds to wait, set only on rejection
    pub retry_after: Option<u64>,
    /// Text to show the client on rejection
    #[serde(skip)]
    pub message: String,
}

impl RateDecision {
    /// `reset_time` as Unix seconds, rounded up.
    pub fn reset_time_secs(&self) -> u64 {
        self.reset_time.div_ceil(1000)
    }
}

/// Read-only view returned by [`RateLimiter::get_remaining`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingInfo {
    pub remaining: u32,
    pub limit: u32,
    pub reset_time: u64,
}

// == Stats ==
#[derive(Debug, Default)]
struct PolicyCounters {
    admitted: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStats {
    pub limit: u32,
    pub window_ms: u64,
    pub admitted: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub active_policies: Vec<String>,
    pub total_policies: usize,
    pub per_policy_counts: BTreeMap<String, PolicyStats>,
    pub slow_down: SlowDownPolicy,
    pub delayed_requests: u64,
    /// Windows currently held in the cache
    pub tracked_windows: usize,
}

// == Rate Limiter ==
/// Shared admission control. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    cache: SharedCache,
    policies: HashMap<String, RateLimitPolicy>,
    fallback: RateLimitPolicy,
    slow_down: SlowDownPolicy,
    counters: HashMap<String, PolicyCounters>,
    delayed: AtomicU64,
}

impl RateLimiter {
    /// Builds a limiter over `policies`. A `general` policy is added if the
    /// set lacks one, since it is the fallback for unknown names.
    pub fn new(cache: SharedCache, policies: Vec<RateLimitPolicy>, slow_down: SlowDownPolicy) -> Self {
        let mut policies: HashMap<String, RateLimitPolicy> = policies
            .into_iter()
            .map(|policy| (policy.name.clone(), policy))
            .collect();
        let fallback = policies
            .entry(GENERAL.to_string())
            .or_insert_with(RateLimitPolicy::general)
            .clone();

        let counters = policies
            .keys()
            .map(|name| (name.clone(), PolicyCounters::default()))
            .collect();

        Self {
            cache,
            policies,
            fallback,
            slow_down,
            counters,
            delayed: AtomicU64::new(0),
        }
    }

    /// Limiter with the default policy set.
    pub fn with_defaults(cache: SharedCache) -> Self {
        Self::new(cache, RateLimitPolicy::defaults(), SlowDownPolicy::default())
    }

    /// Looks up a policy, falling back to `general`.
    pub fn policy(&self, name: &str) -> &RateLimitPolicy {
        self.policies.get(name).unwrap_or(&self.fallback)
    }

    fn window_key(policy: &str, client_id: &str) -> String {
        format!("rateLimit:{}:{}", policy, client_id)
    }

    // == Check And Record ==
    /// Admits or rejects one request from `client_id` under `policy_name`.
    pub async fn check_and_record(&self, policy_name: &str, client_id: &str) -> RateDecision {
        self.check_and_record_at(policy_name, client_id, current_timestamp_ms())
            .await
    }

    pub async fn check_and_record_at(&self, policy_name: &str, client_id: &str, now_ms: u64) -> RateDecision {
        let policy = self.policy(policy_name);
        let key = Self::window_key(&policy.name, client_id);

        let mut store = self.cache.write().await;
        let mut window = load_window(&mut store, &key, now_ms);
        window.prune(now_ms, policy.window_ms);

        let limit = policy.max_requests;
        if window.len() >= limit as usize {
            self.count(&policy.name, false);
            warn!(
                policy = %policy.name,
                client = client_id,
                count = window.len(),
                "Rate limit exceeded"
            );
            return RateDecision {
                admitted: false,
                policy: policy.name.clone(),
                limit,
                remaining: 0,
                reset_time: window.reset_time(now_ms, policy.window_ms),
                retry_after: Some(window.retry_after_secs(now_ms, policy.window_ms)),
                message: policy.message.clone(),
            };
        }

        window.record(now_ms);
        save_window(&mut store, key, &window, policy.window_secs(), now_ms);
        self.count(&policy.name, true);

        RateDecision {
            admitted: true,
            policy: policy.name.clone(),
            limit,
            remaining: limit.saturating_sub(window.len() as u32),
            reset_time: window.reset_time(now_ms, policy.window_ms),
            retry_after: None,
            message: String::new(),
        }
    }

    // == Get Remaining ==
    /// Introspection without touching the stored window or cache counters.
    pub async fn get_remaining(&self, policy_name: &str, client_id: &str) -> RemainingInfo {
        self.get_remaining_at(policy_name, client_id, current_timestamp_ms())
            .await
    }

    pub async fn get_remaining_at(&self, policy_name: &str, client_id: &str, now_ms: u64) -> RemainingInfo {
        let policy = self.policy(policy_name);
        let key = Self::window_key(&policy.name, client_id);

        let mut window = {
            let store = self.cache.read().await;
            store
                .peek_stale(Partition::RateLimit, &key)
                .and_then(|value| serde_json::from_value::<RateWindow>(value).ok())
                .unwrap_or_default()
        };
        window.prune(now_ms, policy.window_ms);

        RemainingInfo {
            remaining: policy.max_requests.saturating_sub(window.len() as u32),
            limit: policy.max_requests,
            reset_time: window.reset_time(now_ms, policy.window_ms),
        }
    }

    // == Reset ==
    /// Clears a client's window for a policy immediately.
    pub async fn reset(&self, policy_name: &str, client_id: &str) {
        let policy = self.policy(policy_name);
        let key = Self::window_key(&policy.name, client_id);
        self.cache.write().await.delete(Partition::RateLimit, &key);
        debug!(policy = %policy.name, client = client_id, "Rate limit reset");
    }

    // == Slow Down ==
    /// Records a request for the slow-down layer and returns the delay the
    /// caller should wait before handling it.
    pub async fn slow_down(&self, client_id: &str) -> Duration {
        self.slow_down_at(client_id, current_timestamp_ms()).await
    }

    pub async fn slow_down_at(&self, client_id: &str, now_ms: u64) -> Duration {
        let key = format!("slowDown:{}", client_id);

        let mut store = self.cache.write().await;
        let mut window = load_window(&mut store, &key, now_ms);
        window.prune(now_ms, self.slow_down.window_ms);
        window.record(now_ms);
        save_window(&mut store, key, &window, self.slow_down.window_secs(), now_ms);

        let delay = self.slow_down.delay_for(window.len());
        if !delay.is_zero() {
            self.delayed.fetch_add(1, Ordering::Relaxed);
            debug!(client = client_id, delay_ms = delay.as_millis() as u64, "Slowing down client");
        }
        delay
    }

    // == Stats ==
    pub async fn stats(&self) -> RateLimitStats {
        let mut active_policies: Vec<String> = self.policies.keys().cloned().collect();
        active_policies.sort();

        let per_policy_counts = self
            .policies
            .values()
            .map(|policy| {
                let counters = &self.counters[&policy.name];
                (
                    policy.name.clone(),
                    PolicyStats {
                        limit: policy.max_requests,
                        window_ms: policy.window_ms,
                        admitted: counters.admitted.load(Ordering::Relaxed),
                        rejected: counters.rejected.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        RateLimitStats {
            total_policies: active_policies.len(),
            active_policies,
            per_policy_counts,
            slow_down: self.slow_down.clone(),
            delayed_requests: self.delayed.load(Ordering::Relaxed),
            tracked_windows: self.cache.read().await.len(Partition::RateLimit),
        }
    }

    fn count(&self, policy: &str, admitted: bool) {
        if let Some(counters) = self.counters.get(policy) {
            let counter = if admitted {
                &counters.admitted
            } else {
                &counters.rejected
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// == Window Persistence ==
/// Loads a window; a corrupt entry counts as an error and starts empty.
fn load_window(store: &mut CacheStore, key: &str, now_ms: u64) -> RateWindow {
    match store.get_at(Partition::RateLimit, key, now_ms) {
        None => RateWindow::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            error!(key, error = %e, "Discarding unreadable rate-limit window");
            store.record_error(Partition::RateLimit);
            RateWindow::default()
        }),
    }
}

fn save_window(store: &mut CacheStore, key: String, window: &RateWindow, ttl_secs: u64, now_ms: u64) {
    match serde_json::to_value(window) {
        Ok(value) => store.set_at(Partition::RateLimit, key, value, Some(ttl_secs), now_ms),
        Err(e) => {
            error!(key = %key, error = %e, "Failed to persist rate-limit window");
            store.record_error(Partition::RateLimit);
        }
    }
}

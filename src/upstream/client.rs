//! Upstream Client
//!
//! Outbound calls to the video platform API with a per-attempt timeout,
//! bounded retry on transient failures, and error classification.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::upstream::{RetryPolicy, UpstreamError};

/// Sent on every upstream request.
pub const USER_AGENT: &str = "Gaming-News-Hub/1.0";

/// Query parameters, kept sorted.
pub type Params = BTreeMap<String, String>;

// == Settings ==
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl UpstreamSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.youtube_base_url.clone(),
            api_key: config.youtube_api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
        }
    }
}

// == Stats ==
#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStats {
    /// "Configured" or "Not configured"
    pub api_key: &'static str,
    pub retry: RetryPolicy,
    pub timeout_ms: u64,
    pub requests: u64,
    pub attempts: u64,
    pub retries: u64,
    pub successes: u64,
    pub failures: u64,
}

// == Upstream Client ==
#[derive(Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    counters: Counters,
}

impl UpstreamClient {
    /// Builds the client. Blank credentials count as missing.
    pub fn new(settings: UpstreamSettings) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::Network(e.without_url().to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.filter(|key| !key.trim().is_empty()),
            timeout: settings.timeout,
            retry: settings.retry,
            counters: Counters::default(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    // == Request ==
    /// GETs `{base_url}/{endpoint}` with `params` plus the credential and
    /// decodes the JSON body.
    ///
    /// 5xx, timeouts and connection failures are retried up to
    /// `max_retries` times with linearly growing delay. 403, 429 and other
    /// statuses fail immediately.
    pub async fn request(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);

            let err = match self.attempt(&url, params, api_key, attempt).await {
                Ok(body) => {
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    debug!(endpoint, attempt, "Upstream request succeeded");
                    return Ok(body);
                }
                Err(err) => err,
            };

            let retries_done = attempt - 1;
            if err.is_transient() && self.retry.allows_retry(retries_done) {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Upstream request failed, retrying"
                );
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                continue;
            }

            error!(
                endpoint,
                attempt,
                max_attempts = self.retry.max_attempts(),
                kind = err.kind(),
                error = %err,
                "Upstream request failed"
            );
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }
    }

    async fn attempt(
        &self,
        url: &str,
        params: &Params,
        api_key: &str,
        attempt: u32,
    ) -> Result<Value, UpstreamError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout { attempts: attempt }
                } else {
                    UpstreamError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::FORBIDDEN => Err(UpstreamError::QuotaOrAuth),
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            s if s.is_server_error() => Err(UpstreamError::Server {
                status: s.as_u16(),
                attempts: attempt,
            }),
            s if !s.is_success() => Err(UpstreamError::Rejected { status: s.as_u16() }),
            _ => response.json::<Value>().await.map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout { attempts: attempt }
                } else {
                    UpstreamError::Decode(e.without_url().to_string())
                }
            }),
        }
    }

    // == Connectivity Self-Test ==
    /// Minimal one-result search. `false` on any failure or without a key.
    pub async fn test_connection(&self) -> bool {
        if !self.is_configured() {
            return false;
        }

        let params: Params = [
            ("part", "snippet"),
            ("q", "test"),
            ("type", "video"),
            ("maxResults", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        match self.request("search", &params).await {
            Ok(_) => {
                info!("YouTube API connection test passed");
                true
            }
            Err(err) => {
                warn!(error = %err, "YouTube API connection test failed");
                false
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> UpstreamStats {
        UpstreamStats {
            api_key: if self.is_configured() {
                "Configured"
            } else {
                "Not configured"
            },
            retry: self.retry,
            timeout_ms: self.timeout.as_millis() as u64,
            requests: self.counters.requests.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn settings(api_key: Option<&str>) -> UpstreamSettings {
        UpstreamSettings {
            // Nothing listens on the discard port; requests fail fast
            base_url: "http://127.0.0.1:9/youtube/v3/".to_string(),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(2),
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
        }
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let client = assert_ok!(UpstreamClient::new(settings(Some("  "))));
        assert!(!client.is_configured());
        assert_eq!(client.stats().api_key, "Not configured");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = UpstreamClient::new(settings(Some("k"))).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9/youtube/v3");
        assert_eq!(client.stats().api_key, "Configured");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = UpstreamClient::new(settings(None)).unwrap();

        let result = client.request("search", &Params::new()).await;
        assert_eq!(result, Err(UpstreamError::NotConfigured));
        assert_eq!(client.stats().attempts, 0);
        assert!(!client.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried_then_surfaced() {
        let client = UpstreamClient::new(settings(Some("k"))).unwrap();

        let err = tokio_test::assert_err!(client.request("search", &Params::new()).await);
        assert!(err.is_transient());
        let stats = client.stats();
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.failures, 1);
        assert!(!err.to_string().contains("key=k"));
    }
}

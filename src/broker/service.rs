//! Request Broker
//!
//! Turns a logical lookup into a cache key, serves it from the cache when
//! fresh, otherwise fetches it upstream (coalescing concurrent misses for the
//! same key) and falls back to stale data when the operation allows it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::broker::{cache_key, Operation};
use crate::cache::{ClearScope, DataSource, Partition, SharedCache};
use crate::config::Config;
use crate::upstream::{Params, UpstreamClient, UpstreamError};

type FetchResult = Result<Value, UpstreamError>;
type Inflight = Mutex<HashMap<String, broadcast::Sender<FetchResult>>>;

// == Operation Policy ==
/// Caching behaviour for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPolicy {
    /// Seconds a fetched response stays fresh
    pub ttl: u64,
    /// Serve an expired entry when upstream fails
    pub allow_stale: bool,
}

// == Response ==
/// What the broker hands back to a route.
#[derive(Debug, Clone)]
pub struct BrokerResponse {
    pub data: Value,
    pub source: DataSource,
    /// Why stale data was served
    pub stale_reason: Option<String>,
}

// == Stats ==
#[derive(Debug, Default)]
struct OperationCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    upstream_fetches: AtomicU64,
    stale_served: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    #[serde(flatten)]
    pub policy: OperationPolicy,
    pub requests: u64,
    pub cache_hits: u64,
    pub upstream_fetches: u64,
    pub stale_served: u64,
    pub coalesced: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStats {
    pub operations: BTreeMap<&'static str, OperationStats>,
    pub inflight: usize,
}

// == Broker ==
#[derive(Debug)]
pub struct Broker {
    cache: SharedCache,
    client: Arc<UpstreamClient>,
    policies: HashMap<Operation, OperationPolicy>,
    counters: HashMap<Operation, OperationCounters>,
    inflight: Arc<Inflight>,
}

impl Broker {
    /// Operations missing from `policies` get a 300 s TTL without stale fallback.
    pub fn new(
        cache: SharedCache,
        client: Arc<UpstreamClient>,
        mut policies: HashMap<Operation, OperationPolicy>,
    ) -> Self {
        for operation in Operation::ALL {
            policies.entry(operation).or_insert(OperationPolicy {
                ttl: 300,
                allow_stale: false,
            });
        }
        let counters = Operation::ALL
            .into_iter()
            .map(|operation| (operation, OperationCounters::default()))
            .collect();

        Self {
            cache,
            client,
            policies,
            counters,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(cache: SharedCache, client: Arc<UpstreamClient>, config: &Config) -> Self {
        let policies = Operation::ALL
            .into_iter()
            .map(|operation| {
                let policy = OperationPolicy {
                    ttl: config.ttl_for(operation),
                    allow_stale: config.stale_fallback.contains(&operation),
                };
                (operation, policy)
            })
            .collect();
        Self::new(cache, client, policies)
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn policy(&self, operation: Operation) -> OperationPolicy {
        self.policies[&operation]
    }

    fn counters(&self, operation: Operation) -> &OperationCounters {
        &self.counters[&operation]
    }

    // == Fetch ==
    /// Serves `operation` with `params` layered over its defaults.
    pub async fn fetch(&self, operation: Operation, params: Params) -> Result<BrokerResponse, UpstreamError> {
        if !self.client.is_configured() {
            return Err(UpstreamError::NotConfigured);
        }

        let mut merged = operation.default_params();
        merged.extend(params);
        let key = cache_key(operation, &merged);
        let policy = self.policy(operation);
        let counters = self.counters(operation);
        counters.requests.fetch_add(1, Ordering::Relaxed);

        let fetched = self
            .cache
            .read_through(&key, policy.allow_stale, || {
                self.fetch_coalesced(&key, operation, &merged, policy.ttl)
            })
            .await;

        match fetched {
            Ok(fetched) => {
                let counter = match fetched.source {
                    DataSource::Cache => &counters.cache_hits,
                    DataSource::Api => &counters.upstream_fetches,
                    DataSource::StaleCache => &counters.stale_served,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(BrokerResponse {
                    data: fetched.value,
                    source: fetched.source,
                    stale_reason: fetched.stale_reason.map(|err| err.to_string()),
                })
            }
            Err(err) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Lookup by a single resource id (channel or video).
    pub async fn fetch_by_id(&self, operation: Operation, id: &str) -> Result<BrokerResponse, UpstreamError> {
        let mut params = Params::new();
        params.insert("id".to_string(), id.to_string());
        self.fetch(operation, params).await
    }

    /// One upstream call per key at a time; later callers await the first.
    ///
    /// The call runs on its own task, so it completes and is cached even if
    /// the request that started it goes away.
    async fn fetch_coalesced(
        &self,
        key: &str,
        operation: Operation,
        params: &Params,
        ttl: u64,
    ) -> FetchResult {
        let (mut rx, leader) = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(key) {
                Some(tx) => (tx.subscribe(), None),
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    inflight.insert(key.to_string(), tx.clone());
                    (rx, Some(tx))
                }
            }
        };

        match leader {
            Some(tx) => self.spawn_fetch(key.to_string(), operation, params.clone(), ttl, tx),
            None => {
                self.counters(operation)
                    .coalesced
                    .fetch_add(1, Ordering::Relaxed);
                debug!(key, "Joining in-flight upstream request");
            }
        }

        rx.recv().await.unwrap_or_else(|_| {
            Err(UpstreamError::Network(
                "upstream fetch ended without a result".to_string(),
            ))
        })
    }

    fn spawn_fetch(
        &self,
        key: String,
        operation: Operation,
        params: Params,
        ttl: u64,
        tx: broadcast::Sender<FetchResult>,
    ) {
        let client = Arc::clone(&self.client);
        let cache = self.cache.clone();
        let guard = InflightGuard {
            inflight: Arc::clone(&self.inflight),
            key,
        };

        tokio::spawn(async move {
            info!(operation = %operation, "Fetching fresh data from YouTube API");
            let result = client.request(operation.endpoint(), &params).await;

            // Store before unregistering so a caller arriving in between
            // hits the cache instead of starting a second fetch.
            if let Ok(value) = &result {
                cache.set(guard.key.clone(), value.clone(), Some(ttl)).await;
            }

            // Every follower subscribed while the entry existed, so all of
            // them receive the result.
            drop(guard);
            let _ = tx.send(result);
        });
    }

    // == Clear ==
    /// Clears cached responses whose key contains `endpoint`, or all of them.
    ///
    /// Returns the number of entries removed.
    pub async fn clear_cache(&self, endpoint: Option<&str>) -> usize {
        let mut store = self.cache.write().await;
        let removed = match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            Some(pattern) => store.delete_matching(Partition::Api, pattern),
            None => store.clear(ClearScope::Partition(Partition::Api)),
        };
        info!(endpoint = endpoint.unwrap_or("all"), removed, "Cache cleared");
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> BrokerStats {
        let operations = Operation::ALL
            .into_iter()
            .map(|operation| {
                let c = self.counters(operation);
                (
                    operation.name(),
                    OperationStats {
                        policy: self.policy(operation),
                        requests: c.requests.load(Ordering::Relaxed),
                        cache_hits: c.cache_hits.load(Ordering::Relaxed),
                        upstream_fetches: c.upstream_fetches.load(Ordering::Relaxed),
                        stale_served: c.stale_served.load(Ordering::Relaxed),
                        coalesced: c.coalesced.load(Ordering::Relaxed),
                        failures: c.failures.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        BrokerStats {
            operations,
            inflight: lock(&self.inflight).len(),
        }
    }
}

// == In-Flight Bookkeeping ==
/// Unregisters a key even if the fetch task panics.
struct InflightGuard {
    inflight: Arc<Inflight>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        lock(&self.inflight).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

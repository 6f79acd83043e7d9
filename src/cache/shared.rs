//! Shared Cache Handle
//!
//! Cloneable async handle around the [`CacheStore`], with the read-through
//! `get_or_set` used by the request broker.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::cache::{CacheReport, CacheStore, ClearScope, Partition};

// == Data Source ==
/// Where a value returned by [`SharedCache::get_or_set`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    /// Fetched from upstream during this call
    Api,
    /// Fresh cache hit
    Cache,
    /// Expired entry served because the fetch failed
    StaleCache,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Api => "API",
            DataSource::Cache => "CACHE",
            DataSource::StaleCache => "STALE_CACHE",
        }
    }

    pub fn is_cached(&self) -> bool {
        !matches!(self, DataSource::Api)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, DataSource::StaleCache)
    }
}

/// A value together with its provenance.
#[derive(Debug, Clone)]
pub struct Fetched<E> {
    pub value: Value,
    pub source: DataSource,
    /// The producer failure that forced a stale read, if any
    pub stale_reason: Option<E>,
}

// == Shared Cache ==
/// Thread-safe handle to the process cache.
///
/// Cloning is cheap; all clones see the same store.
#[derive(Debug, Clone)]
pub struct SharedCache {
    inner: Arc<RwLock<CacheStore>>,
}

impl SharedCache {
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Read lock for multi-step inspection.
    pub async fn read(&self) -> RwLockReadGuard<'_, CacheStore> {
        self.inner.read().await
    }

    /// Write lock for multi-step read-modify-write sequences.
    pub async fn write(&self) -> RwLockWriteGuard<'_, CacheStore> {
        self.inner.write().await
    }

    // == Api Partition Shortcuts ==
    /// Fresh read from the api partition. Takes the write lock since
    /// counters are updated.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.write().await.get(Partition::Api, key)
    }

    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<u64>) {
        self.inner
            .write()
            .await
            .set(Partition::Api, key.into(), value, ttl);
    }

    pub async fn has(&self, key: &str) -> bool {
        self.inner.read().await.has(Partition::Api, key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.delete(Partition::Api, key)
    }

    pub async fn clear(&self, scope: ClearScope) -> usize {
        self.inner.write().await.clear(scope)
    }

    pub async fn stats(&self) -> CacheReport {
        self.inner.read().await.stats()
    }

    // == Get Or Set ==
    /// Read-through lookup on the api partition.
    ///
    /// On a fresh hit the producer is not called. On a miss it is called
    /// exactly once and its value stored with `ttl`. If it fails and
    /// `allow_stale` is set, an expired entry for the key is returned as
    /// [`DataSource::StaleCache`]; otherwise the failure propagates.
    ///
    /// The lock is never held across the producer's await point.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<u64>,
        allow_stale: bool,
        producer: F,
    ) -> Result<Fetched<E>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        self.read_through(key, allow_stale, move || async move {
            let value = producer().await?;
            self.set(key, value.clone(), ttl).await;
            Ok(value)
        })
        .await
    }

    /// Like [`get_or_set`](Self::get_or_set), but the producer is
    /// responsible for storing what it fetched.
    pub async fn read_through<F, Fut, E>(
        &self,
        key: &str,
        allow_stale: bool,
        producer: F,
    ) -> Result<Fetched<E>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        if let Some(value) = self.get(key).await {
            return Ok(Fetched {
                value,
                source: DataSource::Cache,
                stale_reason: None,
            });
        }

        debug!(key, "Fetching fresh data");
        let err = match producer().await {
            Ok(value) => {
                return Ok(Fetched {
                    value,
                    source: DataSource::Api,
                    stale_reason: None,
                })
            }
            Err(err) => err,
        };

        let stale = {
            let mut store = self.inner.write().await;
            store.record_error(Partition::Api);
            if allow_stale {
                store.peek_stale(Partition::Api, key)
            } else {
                None
            }
        };

        match stale {
            Some(value) => {
                warn!(key, error = %err, "Returning stale data");
                Ok(Fetched {
                    value,
                    source: DataSource::StaleCache,
                    stale_reason: Some(err),
                })
            }
            None => Err(err),
        }
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new(CacheStore::default())
    }
}

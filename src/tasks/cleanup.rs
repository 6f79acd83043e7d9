//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from one cache
//! partition.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{Partition, SharedCache};

/// Spawns a sweep over `partition` every `interval_secs` seconds.
///
/// Entries are removed once they have been expired for longer than
/// `grace_ms`; a non-zero grace keeps them around for stale fallback.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = SharedCache::default();
/// let handle = spawn_cleanup_task(cache.clone(), Partition::RateLimit, 10, 0);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    cache: SharedCache,
    partition: Partition,
    interval_secs: u64,
    grace_ms: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            partition = %partition,
            interval_secs,
            grace_ms,
            "Starting cache sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let (removed, remaining) = {
                let mut store = cache.write().await;
                let removed = store.cleanup_expired(partition, grace_ms);
                (removed, store.len(partition))
            };

            if removed > 0 {
                info!(partition = %partition, removed, remaining, "Cache sweep removed expired entries");
            } else {
                debug!(partition = %partition, remaining, "Cache sweep found nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::current_timestamp_ms;
    use serde_json::json;

    async fn insert_expired(cache: &SharedCache, partition: Partition, key: &str) {
        let long_ago = current_timestamp_ms() - 60_000;
        cache
            .write()
            .await
            .set_at(partition, key.to_string(), json!("old"), Some(1), long_ago);
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = SharedCache::default();
        insert_expired(&cache, Partition::RateLimit, "rateLimit:general:1.2.3.4").await;

        let handle = spawn_cleanup_task(cache.clone(), Partition::RateLimit, 1, 0);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.read().await.len(Partition::RateLimit), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_respects_grace_and_partition() {
        let cache = SharedCache::default();
        insert_expired(&cache, Partition::Api, "youtube:video:{}").await;
        cache.set("youtube:search:{}", json!("fresh"), Some(3600)).await;

        // Sweeps only the rate-limit partition
        let other = spawn_cleanup_task(cache.clone(), Partition::RateLimit, 1, 0);
        // Expired a minute ago, grace of ten minutes
        let graced = spawn_cleanup_task(cache.clone(), Partition::Api, 1, 600_000);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let store = cache.read().await;
        assert_eq!(store.len(Partition::Api), 2);
        assert!(store.peek_stale(Partition::Api, "youtube:video:{}").is_some());
        drop(store);

        other.abort();
        graced.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(SharedCache::default(), Partition::Api, 1, 0);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}

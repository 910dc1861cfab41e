// Time-boxed in-memory cache: populate on miss, expire on read.

use cached::{Cached, TimedCache};
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;

/// Named TTL cache shared across tasks. Lifespans are whole seconds, at least one.
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<TimedCache<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        let seconds = ttl.as_secs().max(1);
        Self {
            name,
            ttl: Duration::from_secs(seconds),
            entries: Mutex::new(TimedCache::with_lifespan(seconds)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expired entries are evicted by the lookup itself.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().await.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.lock().await.cache_set(key, value);
    }

    /// Returns the cached value, or runs `fetch` and caches its `Ok` result.
    /// Errors are returned as-is and never cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(cache = self.name, ?key, "Cache hit");
            return Ok(value);
        }
        tracing::debug!(cache = self.name, ?key, "Cache miss, fetching");
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.lock().await.cache_remove(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.cache_clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.cache_size();
        entries.flush();
        let purged = before - entries.cache_size();
        if purged > 0 {
            tracing::debug!(cache = self.name, purged, "Purged expired entries");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAST_ONE_SECOND: Duration = Duration::from_millis(1100);

    #[tokio::test]
    async fn populates_on_miss_and_serves_hits() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test", Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with("brands", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let cache: TtlCache<u8, &str> = TtlCache::new("short", Duration::from_secs(1));
        cache.insert(1, "stale").await;
        assert_eq!(cache.get(&1).await, Some("stale"));
        tokio::time::sleep(PAST_ONE_SECOND).await;
        assert_eq!(cache.get(&1).await, None);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn sub_second_ttl_rounds_up() {
        let cache: TtlCache<u8, u8> = TtlCache::new("tiny", Duration::from_millis(20));
        assert_eq!(cache.ttl(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: TtlCache<u8, u8> = TtlCache::new("errors", Duration::from_secs(60));
        let first = cache.get_or_try_insert_with(1, || async { Err::<u8, &str>("down") }).await;
        assert_eq!(first, Err("down"));
        let second = cache.get_or_try_insert_with(1, || async { Ok::<u8, &str>(5) }).await;
        assert_eq!(second, Ok(5));
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let cache: TtlCache<u8, u8> = TtlCache::new("purge", Duration::from_secs(1));
        cache.insert(1, 1).await;
        tokio::time::sleep(PAST_ONE_SECOND).await;
        cache.insert(2, 2).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        cache.invalidate(&2).await;
        assert!(cache.is_empty().await);
    }
}

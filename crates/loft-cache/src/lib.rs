//! Metadata query cache
//!
//! A TTL cache in front of the metadata store with two guarantees the store
//! cannot give on its own:
//!
//! - **Single-flight**: concurrent callers asking for the same key while a
//!   computation is in flight share one execution and one result; the backing
//!   store sees a single query.
//! - **Post-mutation freshness**: [`QueryCache::invalidate_prefix`] removes
//!   every entry scoped to an owner, and a computation that was already in
//!   flight when the invalidation happened is not written back, so a read
//!   issued after a mutation can never observe pre-mutation data.
//!
//! Distinct keys never contend. Keys are plain strings, by convention
//! `files:{owner}:{query...}`, so owner-scoped invalidation is a prefix scan.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct QueryCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    guards: DashMap<String, Arc<Mutex<()>>>,
    epoch: AtomicU64,
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> QueryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            guards: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `compute` once to fill it.
    ///
    /// Errors from `compute` propagate to the caller and are never cached.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get_fresh(key) {
            return Ok(value);
        }

        let guard = self
            .guards
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _flight = guard.lock().await;

        // A concurrent caller may have filled the entry while we waited.
        if let Some(value) = self.get_fresh(key) {
            tracing::debug!(key, "cache filled by concurrent computation");
            return Ok(value);
        }

        let epoch_before = self.epoch.load(Ordering::Acquire);
        let value = compute().await?;

        // Skip the write-back if an invalidation raced the computation; the
        // result may predate the mutation that triggered it.
        if self.epoch.load(Ordering::Acquire) == epoch_before {
            self.entries.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        } else {
            tracing::debug!(key, "discarding computation that raced an invalidation");
        }

        Ok(value)
    }

    /// Delete every entry whose key starts with `prefix`. Call after any
    /// mutation for the owner the prefix scopes, before surfacing the
    /// mutation's success.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.epoch.fetch_add(1, Ordering::AcqRel);

        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        self.guards.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();

        tracing::debug!(prefix, removed, "Invalidated cache entries");

        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_fresh(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => {
                if Instant::now() < entry.expires_at {
                    return Some(entry.value.clone());
                }
                true
            }
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn concurrent_same_key_callers_share_one_computation() {
        let cache = Arc::new(QueryCache::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let compute = |cache: Arc<QueryCache<String>>, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_compute("files:u1:list", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, ()>("result".to_string())
                })
                .await
        };

        let (a, b) = tokio::join!(
            compute(cache.clone(), calls.clone()),
            compute(cache.clone(), calls.clone())
        );

        assert_eq!(a.unwrap(), "result");
        assert_eq!(b.unwrap(), "result");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_compute_independently() {
        let cache = QueryCache::<u32>::new();

        let a = cache.get_or_compute("files:u1:list", TTL, || async { Ok::<_, ()>(1) });
        let b = cache.get_or_compute("files:u2:list", TTL, || async { Ok::<_, ()>(2) });
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let cache = QueryCache::<u32>::new();
        let calls = AtomicUsize::new(0);

        let get = || async {
            cache
                .get_or_compute("k", Duration::from_secs(30), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(9)
                })
                .await
                .unwrap()
        };

        assert_eq!(get().await, 9);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(get().await, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(get().await, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidation_scopes_to_the_owner_prefix() {
        let cache = QueryCache::<u32>::new();

        cache
            .get_or_compute("files:u1:list", TTL, || async { Ok::<_, ()>(1) })
            .await
            .unwrap();
        cache
            .get_or_compute("files:u1:page:2", TTL, || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        cache
            .get_or_compute("files:u2:list", TTL, || async { Ok::<_, ()>(3) })
            .await
            .unwrap();

        assert_eq!(cache.invalidate_prefix("files:u1:"), 2);
        assert_eq!(cache.len(), 1);

        // u1 recomputes, u2 is still served from cache.
        let recomputed = cache
            .get_or_compute("files:u1:list", TTL, || async { Ok::<_, ()>(10) })
            .await
            .unwrap();
        assert_eq!(recomputed, 10);
        let cached = cache
            .get_or_compute("files:u2:list", TTL, || async { Ok::<_, ()>(99) })
            .await
            .unwrap();
        assert_eq!(cached, 3);
    }

    #[tokio::test]
    async fn computation_racing_an_invalidation_is_not_cached() {
        let cache = Arc::new(QueryCache::<u32>::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (resume_tx, resume_rx) = tokio::sync::oneshot::channel();

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("files:u1:list", TTL, || async move {
                        started_tx.send(()).unwrap();
                        resume_rx.await.unwrap();
                        Ok::<_, ()>(1)
                    })
                    .await
                    .unwrap()
            })
        };

        started_rx.await.unwrap();
        // Mutation lands while the read computation is in flight.
        cache.invalidate_prefix("files:u1:");
        resume_tx.send(()).unwrap();

        assert_eq!(reader.await.unwrap(), 1);
        // The stale result was not written back.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn errors_propagate_and_are_not_cached() {
        let cache = QueryCache::<u32>::new();
        let calls = AtomicUsize::new(0);

        let failed = cache
            .get_or_compute("k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, &str>("backing store down")
            })
            .await;
        assert!(failed.is_err());

        let ok = cache
            .get_or_compute("k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(5)
            })
            .await;
        assert_eq!(ok.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

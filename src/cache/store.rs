//! Keyed read cache with staleness windows and in-flight coalescing.
//!
//! At most one fetch per key runs at a time: concurrent callers of the same key
//! await the same shared future. Every invalidation bumps a per-operation
//! generation; a fetch that started before the bump still answers its callers
//! but is never written back, so stale rows cannot re-enter the cache.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use crate::application::error::AppError;

use super::config::CacheConfig;
use super::keys::{KeyPattern, QueryKey, QueryKind};
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedValue, AppError>>>;

struct CacheEntry {
    value: CachedValue,
    fetched_at: Instant,
}

struct InFlight {
    id: u64,
    generation: u64,
    fetch: SharedFetch,
}

/// Process-wide store for query results.
pub struct QueryCache {
    config: CacheConfig,
    entries: RwLock<LruCache<QueryKey, CacheEntry>>,
    in_flight: DashMap<QueryKey, InFlight>,
    generations: Mutex<HashMap<QueryKind, u64>>,
    next_flight_id: AtomicU64,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.max_entries_non_zero();
        Self {
            config,
            entries: RwLock::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
            generations: Mutex::new(HashMap::new()),
            next_flight_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Serve `key` from cache while fresh, otherwise run (or join) a fetch.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> Result<T, AppError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        if let Some(value) = self.fresh(&key) {
            counter!("agencia_query_cache_hit_total", "query" => key.kind.as_str()).increment(1);
            debug!(query = %key, result = "hit", "Query cache lookup");
            return downcast(&key, value);
        }

        let (flight_id, generation, fetch) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                counter!("agencia_query_cache_coalesced_total", "query" => key.kind.as_str())
                    .increment(1);
                debug!(query = %key, result = "coalesced", "Query cache lookup");
                let flight = entry.get();
                (flight.id, flight.generation, flight.fetch.clone())
            }
            Entry::Vacant(entry) => {
                counter!("agencia_query_cache_miss_total", "query" => key.kind.as_str())
                    .increment(1);
                debug!(query = %key, result = "miss", "Query cache lookup");
                let id = self.next_flight_id.fetch_add(1, Ordering::SeqCst);
                let generation = self.generation(key.kind);
                let pending = loader();
                let fetch = async move { pending.await.map(|value| Arc::new(value) as CachedValue) }
                    .boxed()
                    .shared();
                entry.insert(InFlight {
                    id,
                    generation,
                    fetch: fetch.clone(),
                });
                (id, generation, fetch)
            }
        };

        let outcome = fetch.await;

        // Whoever observes completion first retires the flight; the write-back is
        // idempotent so coalesced callers may repeat it.
        self.in_flight
            .remove_if(&key, |_, flight| flight.id == flight_id);
        if let Ok(value) = &outcome
            && !self.write_back(&key, generation, Arc::clone(value))
        {
            debug!(query = %key, "Discarding result invalidated while in flight");
        }

        outcome.and_then(|value| downcast(&key, value))
    }

    /// Drop every cached entry and pending fetch matched by `patterns`.
    ///
    /// Returns the number of cached entries removed.
    pub fn invalidate(&self, patterns: &[KeyPattern]) -> usize {
        if patterns.is_empty() {
            return 0;
        }

        let removed = {
            // Lock order: entries, then generations. A write-back checks its
            // generation under the same entries guard.
            let mut entries = rw_write(&self.entries, SOURCE, "invalidate.entries");
            {
                let mut generations =
                    mutex_lock(&self.generations, SOURCE, "invalidate.generations");
                for pattern in patterns {
                    *generations.entry(pattern.kind()).or_insert(0) += 1;
                }
            }
            let doomed: Vec<QueryKey> = entries
                .iter()
                .filter(|(key, _)| patterns.iter().any(|pattern| pattern.matches(key)))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &doomed {
                entries.pop(key);
            }
            doomed.len()
        };

        self.in_flight
            .retain(|key, _| !patterns.iter().any(|pattern| pattern.matches(key)));

        counter!("agencia_query_cache_invalidated_total").increment(removed as u64);
        debug!(patterns = ?patterns, removed, "Query cache invalidated");
        removed
    }

    /// True when `key` has an entry, fresh or not.
    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains(key)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
        self.in_flight.clear();
    }

    fn fresh(&self, key: &QueryKey) -> Option<CachedValue> {
        let stale_after = self.config.stale_time(key.kind);
        let mut entries = rw_write(&self.entries, SOURCE, "fresh");
        let entry = entries.get(key)?;
        (entry.fetched_at.elapsed() < stale_after).then(|| Arc::clone(&entry.value))
    }

    /// Store `value` unless `key`'s operation was invalidated after `generation`.
    fn write_back(&self, key: &QueryKey, generation: u64, value: CachedValue) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "fetch.store");
        if self.generation(key.kind) != generation {
            return false;
        }
        entries.put(
            key.clone(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
        true
    }

    fn generation(&self, kind: QueryKind) -> u64 {
        mutex_lock(&self.generations, SOURCE, "generation")
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn downcast<T>(key: &QueryKey, value: CachedValue) -> Result<T, AppError>
where
    T: Clone + Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map(|typed| typed.as_ref().clone())
        .map_err(|_| AppError::unexpected(format!("cached value for `{key}` has an unexpected type")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: Vec<u32>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<u32>, AppError>> + Send + use<> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_the_cache() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(QueryKind::Authors);

        let first = cache
            .fetch(key.clone(), counting_loader(&calls, vec![1, 2]))
            .await
            .expect("first read");
        let second = cache
            .fetch(key.clone(), counting_loader(&calls, vec![9]))
            .await
            .expect("second read");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&key));
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(QueryKind::BlogArticles);

        let (a, b, c) = tokio::join!(
            cache.fetch(key.clone(), counting_loader(&calls, vec![1])),
            cache.fetch(key.clone(), counting_loader(&calls, vec![2])),
            cache.fetch(key.clone(), counting_loader(&calls, vec![3])),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.expect("a"), vec![1]);
        assert_eq!(b.expect("b"), vec![1]);
        assert_eq!(c.expect("c"), vec![1]);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(QueryKind::AllArticles);

        cache
            .fetch(key.clone(), counting_loader(&calls, vec![1]))
            .await
            .expect("first");
        let removed = cache.invalidate(&[KeyPattern::Kind(QueryKind::AllArticles)]);
        assert_eq!(removed, 1);
        assert!(!cache.contains(&key));

        let refreshed = cache
            .fetch(key.clone(), counting_loader(&calls, vec![1, 2]))
            .await
            .expect("second");
        assert_eq!(refreshed, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unrelated_keys_survive_invalidation() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(
                QueryKey::new(QueryKind::Authors),
                counting_loader(&calls, vec![1]),
            )
            .await
            .expect("authors");
        cache.invalidate(&[KeyPattern::Kind(QueryKind::AllArticles)]);

        assert!(cache.contains(&QueryKey::new(QueryKind::Authors)));
    }

    #[tokio::test]
    async fn results_invalidated_mid_flight_are_not_stored() {
        let cache = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(QueryKind::UserProfiles);

        let reader = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let loader = counting_loader(&calls, vec![1]);
            tokio::spawn(async move { cache.fetch(key, loader).await })
        };
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.invalidate(&[KeyPattern::Kind(QueryKind::UserProfiles)]);

        let stale = reader.await.expect("join").expect("read");
        assert_eq!(stale, vec![1]);
        assert!(!cache.contains(&key));
    }

    #[test]
    fn write_back_is_refused_once_the_generation_moves() {
        let cache = QueryCache::default();
        let key = QueryKey::new(QueryKind::BlogArticles);
        let started = cache.generation(key.kind);

        cache.invalidate(&[KeyPattern::Kind(QueryKind::BlogArticles)]);

        assert!(!cache.write_back(&key, started, Arc::new(vec![1u32])));
        assert!(!cache.contains(&key));
        let current = cache.generation(key.kind);
        assert!(cache.write_back(&key, current, Arc::new(vec![2u32])));
        assert!(cache.contains(&key));
    }

    #[tokio::test]
    async fn errors_are_shared_but_not_cached() {
        let cache = QueryCache::default();
        let key = QueryKey::new(QueryKind::AdminRequests);

        let failed = cache
            .fetch(key.clone(), || async {
                Err::<Vec<u32>, _>(AppError::unexpected("offline"))
            })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains(&key));

        let recovered = cache
            .fetch(key.clone(), || async { Ok(vec![5_u32]) })
            .await
            .expect("second attempt");
        assert_eq!(recovered, vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_refetched() {
        let cache = QueryCache::new(CacheConfig {
            default_stale_seconds: 30,
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new(QueryKind::Authors);

        cache
            .fetch(key.clone(), counting_loader(&calls, vec![1]))
            .await
            .expect("first");
        tokio::time::advance(Duration::from_secs(29)).await;
        cache
            .fetch(key.clone(), counting_loader(&calls, vec![2]))
            .await
            .expect("still fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = cache
            .fetch(key.clone(), counting_loader(&calls, vec![2]))
            .await
            .expect("stale");
        assert_eq!(refreshed, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mismatched_types_are_reported() {
        let cache = QueryCache::default();
        let key = QueryKey::new(QueryKind::Authors);

        cache
            .fetch(key.clone(), || async { Ok(1_u8) })
            .await
            .expect("store u8");
        let result = cache.fetch(key, || async { Ok(String::new()) }).await;
        assert!(matches!(result, Err(AppError::Unexpected(_))));
    }
}

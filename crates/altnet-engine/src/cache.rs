//! TTL-bounded memoization in front of store reads.
//!
//! Each slot holds `{data, fetched_at}`. A read within the TTL hands back the
//! same `Arc`; anything older is refetched and overwritten. Invalidation only
//! marks a slot stale, so the last value stays available as a degraded
//! fallback when a refetch fails.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Slot<T> {
    data: Arc<T>,
    fetched_at: Instant,
    invalidated: bool,
}

impl<T> Slot<T> {
    fn new(data: Arc<T>) -> Self {
        Self { data, fetched_at: Instant::now(), invalidated: false }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.fetched_at.elapsed() < ttl
    }
}

/// A single cached value.
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: Mutex::new(None) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it is still within the TTL.
    pub fn fresh(&self) -> Option<Arc<T>> {
        self.slot
            .lock()
            .as_ref()
            .filter(|s| s.is_fresh(self.ttl))
            .map(|s| Arc::clone(&s.data))
    }

    /// The cached value regardless of age.
    pub fn stale(&self) -> Option<Arc<T>> {
        self.slot.lock().as_ref().map(|s| Arc::clone(&s.data))
    }

    pub fn put(&self, data: T) -> Arc<T> {
        let data = Arc::new(data);
        *self.slot.lock() = Some(Slot::new(Arc::clone(&data)));
        data
    }

    /// Force the next read to refetch.
    pub fn invalidate(&self) {
        if let Some(slot) = self.slot.lock().as_mut() {
            slot.invalidated = true;
        }
    }

    /// Serve from the slot when fresh (and `force` is off), else run `fetch`
    /// and store its result. A failed fetch leaves the slot untouched.
    pub async fn get_or_fetch<F, Fut, E>(&self, force: bool, fetch: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !force {
            if let Some(hit) = self.fresh() {
                return Ok(hit);
            }
        }
        let data = fetch().await?;
        Ok(self.put(data))
    }
}

/// A map of independent single-value slots.
pub struct KeyedTtlCache<T> {
    ttl: Duration,
    slots: DashMap<String, Slot<T>>,
}

impl<T> KeyedTtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slots: DashMap::new() }
    }

    pub fn fresh(&self, key: &str) -> Option<Arc<T>> {
        self.slots
            .get(key)
            .filter(|s| s.is_fresh(self.ttl))
            .map(|s| Arc::clone(&s.data))
    }

    /// Store a value; expired slots for other keys are dropped.
    pub fn put(&self, key: &str, data: T) -> Arc<T> {
        let data = Arc::new(data);
        self.slots.retain(|_, slot| slot.is_fresh(self.ttl));
        self.slots.insert(key.to_string(), Slot::new(Arc::clone(&data)));
        data
    }

    pub fn invalidate(&self, key: &str) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.invalidated = true;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, force: bool, fetch: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !force {
            if let Some(hit) = self.fresh(key) {
                return Ok(hit);
            }
        }
        let data = fetch().await?;
        Ok(self.put(key, data))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    async fn counted(counter: &AtomicUsize) -> Result<usize, Infallible> {
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_returns_same_arc() {
        let cache = TtlCache::new(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);
        let first = cache.get_or_fetch(false, || counted(&calls)).await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get_or_fetch(false, || counted(&calls)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_refetches() {
        let cache = TtlCache::new(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);
        cache.get_or_fetch(false, || counted(&calls)).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        let again = cache.get_or_fetch(false, || counted(&calls)).await.unwrap();
        assert_eq!(*again, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn force_always_refetches() {
        let cache = TtlCache::new(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);
        cache.get_or_fetch(false, || counted(&calls)).await.unwrap();
        cache.get_or_fetch(true, || counted(&calls)).await.unwrap();
        cache.get_or_fetch(true, || counted(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalidate_keeps_stale_value() {
        let cache = TtlCache::new(DEFAULT_TTL);
        cache.put(7);
        cache.invalidate();
        assert!(cache.fresh().is_none());
        assert_eq!(cache.stale().as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_slot() {
        let cache = TtlCache::new(DEFAULT_TTL);
        cache.put(1);
        let err: Result<_, &str> = cache.get_or_fetch(true, || async { Err("down") }).await;
        assert!(err.is_err());
        assert_eq!(cache.stale().as_deref(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn keyed_slots_are_independent() {
        let cache = KeyedTtlCache::new(Duration::from_secs(10));
        let calls = AtomicUsize::new(0);
        let a1 = cache.get_or_fetch("a", false, || counted(&calls)).await.unwrap();
        let b1 = cache.get_or_fetch("b", false, || counted(&calls)).await.unwrap();
        assert_ne!(*a1, *b1);

        let a2 = cache.get_or_fetch("a", false, || counted(&calls)).await.unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));

        tokio::time::advance(Duration::from_secs(10)).await;
        let a3 = cache.get_or_fetch("a", false, || counted(&calls)).await.unwrap();
        assert_eq!(*a3, 3);

        cache.put("b", 9);
        cache.invalidate("b");
        assert!(cache.fresh("b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_slots_are_evicted_on_insert() {
        let cache = KeyedTtlCache::new(Duration::from_secs(10));
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.put("c", 3);
        assert_eq!(cache.len(), 3);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.put("d", 4);
        assert_eq!(cache.len(), 2);
        assert!(cache.fresh("a").is_none());
        assert_eq!(cache.fresh("c").as_deref(), Some(&3));
    }
}

//! Time-bounded, size-bounded cache of the last value per tracked object.
//!
//! The cache is the only state shared between the ingestion loops (writers)
//! and the enrichment pass (reader). All locking is internal: callers only
//! see [`TtlCache::update`], [`TtlCache::lookup`] and the scoped
//! [`TtlCache::read_for`].
//!
//! # Semantics
//!
//! - One entry per [`CacheKey`]; a newer write replaces value and timestamp.
//! - Expiry is never eager. A lookup treats an entry older than the TTL as a
//!   miss and leaves it in place until it is overwritten or flushed.
//! - When inserting a new key would exceed `max_size`, the whole map is
//!   cleared first. Readers see a momentary total miss after that.
//! - TTL and capacity are atomics and apply from the next operation on.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Originating source (camera stream).
    pub source_id: u32,
    /// Tracked object within the source.
    pub object_id: u64,
}

impl CacheKey {
    /// Build a key.
    pub fn new(source_id: u32, object_id: u64) -> Self {
        Self {
            source_id,
            object_id,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    received_at: Instant,
}

/// Owned copy of a fresh entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    /// Canonical string value.
    pub value: String,
    /// When the value was written.
    pub received_at: Instant,
    /// Age at lookup time.
    pub age: Duration,
}

/// Borrowed view of a fresh entry, valid while the read scope is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHit<'a> {
    /// Canonical string value.
    pub value: &'a str,
    /// When the value was written.
    pub received_at: Instant,
    /// Age at lookup time.
    pub age: Duration,
}

impl CacheHit<'_> {
    /// Copy the hit out of the read scope.
    pub fn to_owned_value(&self) -> CachedValue {
        CachedValue {
            value: self.value.to_string(),
            received_at: self.received_at,
            age: self.age,
        }
    }
}

/// Age of an entry if it is still fresh under `ttl_ms` (0 disables expiry).
///
/// Ages are compared in whole milliseconds.
fn fresh_age(received_at: Instant, ttl_ms: u64, now: Instant) -> Option<Duration> {
    let age = now.saturating_duration_since(received_at);
    if ttl_ms == 0 || age.as_millis() <= u128::from(ttl_ms) {
        Some(age)
    } else {
        None
    }
}

/// Concurrent TTL cache keyed by (source, object).
#[derive(Debug)]
pub struct TtlCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl_ms: AtomicU64,
    max_size: AtomicUsize,
    flushes: AtomicU64,
}

impl TtlCache {
    /// Create a cache.
    ///
    /// # Arguments
    /// * `ttl_ms` - Freshness bound in milliseconds (0 = never stale)
    /// * `max_size` - Maximum number of entries (0 = unbounded)
    pub fn new(ttl_ms: u64, max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_ms: AtomicU64::new(ttl_ms),
            max_size: AtomicUsize::new(max_size),
            flushes: AtomicU64::new(0),
        }
    }

    /// Insert or replace the value for a key, stamped with the current time.
    pub fn update(&self, source_id: u32, object_id: u64, value: impl Into<String>) {
        self.update_at(CacheKey::new(source_id, object_id), value, Instant::now());
    }

    /// Insert or replace the value for a key with an explicit receipt time.
    ///
    /// Only an insert that would grow the map past `max_size` flushes it.
    /// Replacing a key that is already stored never flushes, even at capacity.
    pub fn update_at(&self, key: CacheKey, value: impl Into<String>, received_at: Instant) {
        let value = value.into();
        let max_size = self.max_size.load(Ordering::Relaxed);

        let mut entries = self.entries.write();
        if max_size > 0 && entries.len() >= max_size && !entries.contains_key(&key) {
            let dropped = entries.len();
            entries.clear();
            self.flushes.fetch_add(1, Ordering::Relaxed);
            debug!("Cache overflow at {} entries (max {}), flushed", dropped, max_size);
        }
        entries.insert(key, CacheEntry { value, received_at });
    }

    /// Look up a key and return a copy of its value if fresh.
    ///
    /// A stale entry behaves as a miss and is left untouched.
    pub fn lookup(
        &self,
        source_id: u32,
        object_id: u64,
        ttl_ms: u64,
        now: Instant,
    ) -> Option<CachedValue> {
        let entries = self.entries.read();
        CacheReader { entries: &entries }
            .lookup(CacheKey::new(source_id, object_id), ttl_ms, now)
            .map(|hit| hit.to_owned_value())
    }

    /// Run `f` under one shared-lock scope, waiting at most `timeout` for it.
    ///
    /// Returns `None` if the shared lock could not be acquired in time (a
    /// writer held it); the closure is not called in that case.
    pub fn read_for<R>(&self, timeout: Duration, f: impl FnOnce(&CacheReader<'_>) -> R) -> Option<R> {
        let entries = self.entries.try_read_for(timeout)?;
        Some(f(&CacheReader { entries: &entries }))
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current TTL in milliseconds.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms.load(Ordering::Relaxed)
    }

    /// Change the TTL used by subsequent enrichment passes.
    pub fn set_ttl_ms(&self, ttl_ms: u64) {
        self.ttl_ms.store(ttl_ms, Ordering::Relaxed);
    }

    /// Current capacity (0 = unbounded).
    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::Relaxed)
    }

    /// Change the capacity. Stored entries are not touched until the next
    /// insert of a new key.
    pub fn set_max_size(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::Relaxed);
    }

    /// Number of overflow flushes since creation.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Read-only view handed out by [`TtlCache::read_for`].
pub struct CacheReader<'a> {
    entries: &'a HashMap<CacheKey, CacheEntry>,
}

impl<'a> CacheReader<'a> {
    /// Look up a key, returning a borrowed hit if fresh.
    pub fn lookup(&self, key: CacheKey, ttl_ms: u64, now: Instant) -> Option<CacheHit<'a>> {
        let entry = self.entries.get(&key)?;
        let age = fresh_age(entry.received_at, ttl_ms, now)?;
        Some(CacheHit {
            value: entry.value.as_str(),
            received_at: entry.received_at,
            age,
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let cache = TtlCache::new(0, 0);
        cache.update(1, 7, "first");
        cache.update(1, 7, "second");

        let hit = cache.lookup(1, 7, 0, Instant::now()).expect("hit");
        assert_eq!(hit.value, "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_differ_by_source() {
        let cache = TtlCache::new(0, 0);
        cache.update(1, 7, "a");
        cache.update(2, 7, "b");

        let now = Instant::now();
        assert_eq!(cache.lookup(1, 7, 0, now).unwrap().value, "a");
        assert_eq!(cache.lookup(2, 7, 0, now).unwrap().value, "b");
        assert!(cache.lookup(3, 7, 0, now).is_none());
    }

    #[test]
    fn stale_entry_is_a_miss_but_stays_stored() {
        let cache = TtlCache::new(100, 0);
        let written = Instant::now();
        cache.update_at(CacheKey::new(0, 1), "v", written);

        assert!(cache.lookup(0, 1, 100, written + Duration::from_millis(100)).is_some());
        assert!(cache.lookup(0, 1, 100, written + Duration::from_millis(101)).is_none());
        assert_eq!(cache.len(), 1);

        // TTL disabled: always fresh.
        let hit = cache
            .lookup(0, 1, 0, written + Duration::from_secs(3600))
            .expect("ttl 0 never expires");
        assert_eq!(hit.age, Duration::from_secs(3600));
    }

    #[test]
    fn sub_millisecond_excess_is_still_fresh() {
        let cache = TtlCache::new(10, 0);
        let written = Instant::now();
        cache.update_at(CacheKey::new(0, 1), "v", written);

        let now = written + Duration::from_micros(10_900);
        assert!(cache.lookup(0, 1, 10, now).is_some());
    }

    #[test]
    fn overflow_flushes_everything() {
        let cache = TtlCache::new(0, 3);
        cache.update(0, 1, "a");
        cache.update(0, 2, "b");
        cache.update(0, 3, "c");
        assert_eq!(cache.len(), 3);

        cache.update(0, 4, "d");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.flush_count(), 1);

        let now = Instant::now();
        assert!(cache.lookup(0, 1, 0, now).is_none());
        assert_eq!(cache.lookup(0, 4, 0, now).unwrap().value, "d");
    }

    #[test]
    fn replacing_existing_key_at_capacity_does_not_flush() {
        let cache = TtlCache::new(0, 2);
        cache.update(0, 1, "a");
        cache.update(0, 2, "b");
        cache.update(0, 2, "b2");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.flush_count(), 0);
    }

    #[test]
    fn unbounded_cache_never_flushes() {
        let cache = TtlCache::new(0, 0);
        for id in 0..5000 {
            cache.update(0, id, id.to_string());
        }
        assert_eq!(cache.len(), 5000);
        assert_eq!(cache.flush_count(), 0);
    }

    #[test]
    fn capacity_change_applies_on_next_insert() {
        let cache = TtlCache::new(0, 0);
        for id in 0..10 {
            cache.update(0, id, "x");
        }

        cache.set_max_size(4);
        assert_eq!(cache.len(), 10);

        cache.update(0, 100, "y");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ttl_is_live_configurable() {
        let cache = TtlCache::new(1000, 0);
        assert_eq!(cache.ttl_ms(), 1000);
        cache.set_ttl_ms(0);
        assert_eq!(cache.ttl_ms(), 0);
    }

    #[test]
    fn read_scope_serves_many_lookups() {
        let cache = TtlCache::new(0, 0);
        cache.update(5, 1, "one");
        cache.update(5, 2, "two");

        let now = Instant::now();
        let values = cache
            .read_for(Duration::from_millis(10), |reader| {
                assert_eq!(reader.len(), 2);
                [1u64, 2, 3]
                    .iter()
                    .map(|id| reader.lookup(CacheKey::new(5, *id), 0, now).map(|h| h.value.to_string()))
                    .collect::<Vec<_>>()
            })
            .expect("lock available");

        assert_eq!(values, vec![Some("one".into()), Some("two".into()), None]);
    }

    #[test]
    fn read_scope_times_out_while_writer_holds_lock() {
        let cache = TtlCache::new(0, 0);
        let _guard = cache.entries.write();
        let result = cache.read_for(Duration::from_millis(5), |reader| reader.len());
        assert!(result.is_none());
    }
}

//! In-process cache tier with per-entry expiry and LRU eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CacheEntry, CacheKey};
use crate::util::Clock;

/// A bounded TTL + LRU map for hot lookups.
///
/// Every operation is a single lock-guarded step, so a lookup never races a
/// concurrent insert for the same key.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheInner>>,
    clock: Arc<dyn Clock>,
}

struct CacheInner {
    entries: HashMap<CacheKey, Slot>,
    max_entries: usize,
    tick: u64,
}

struct Slot {
    entry: CacheEntry,
    last_accessed: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

impl MemoryCache {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                max_entries,
                tick: 0,
            })),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a live entry, dropping it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let tick = inner.next_tick();

        match inner.entries.get(key).map(|slot| slot.entry.is_live(now)) {
            Some(true) => {
                let slot = inner.entries.get_mut(key)?;
                slot.last_accessed = tick;
                Some(slot.entry.clone())
            }
            Some(false) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert an entry, evicting expired entries and then the least recently
    /// used one if the cache is full.
    pub fn insert(&self, entry: CacheEntry) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if inner.max_entries == 0 || !entry.is_live(now) {
            return;
        }

        if !inner.entries.contains_key(&entry.key) && inner.entries.len() >= inner.max_entries {
            inner.entries.retain(|_, slot| slot.entry.is_live(now));
        }

        while !inner.entries.contains_key(&entry.key) && inner.entries.len() >= inner.max_entries {
            let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_accessed)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            inner.entries.remove(&lru_key);
        }

        let tick = inner.next_tick();
        inner.entries.insert(
            entry.key.clone(),
            Slot {
                entry,
                last_accessed: tick,
            },
        );
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, slot| slot.entry.is_live(now));
        before - inner.entries.len()
    }

    /// Remove entries matching `predicate`, returning how many were removed.
    pub fn remove_where(&self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, slot| !predicate(&slot.entry));
        before - inner.entries.len()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Current number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Domain, SearchPayload};
    use crate::util::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    fn entry(clock: &ManualClock, name: &str, ttl: Duration) -> CacheEntry {
        let now = clock.now();
        CacheEntry {
            key: CacheKey::encode(Domain::Location, &json!({ "keyword": name })),
            domain: Domain::Location,
            payload: SearchPayload::default(),
            created_at: now,
            expires_at: crate::util::clock::add_duration(now, ttl),
        }
    }

    #[test]
    fn expired_entries_are_misses() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(4, Arc::new(clock.clone()));
        let paris = entry(&clock, "paris", Duration::from_millis(100));
        cache.insert(paris.clone());

        assert_eq!(cache.get(&paris.key), Some(paris.clone()));
        clock.advance(Duration::from_millis(150));
        assert_eq!(cache.get(&paris.key), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn full_cache_evicts_least_recently_used() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(2, Arc::new(clock.clone()));
        let a = entry(&clock, "a", Duration::from_secs(60));
        let b = entry(&clock, "b", Duration::from_secs(60));
        let c = entry(&clock, "c", Duration::from_secs(60));

        cache.insert(a.clone());
        cache.insert(b.clone());
        assert!(cache.get(&a.key).is_some());
        cache.insert(c.clone());

        assert!(cache.get(&a.key).is_some());
        assert!(cache.get(&b.key).is_none());
        assert!(cache.get(&c.key).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entries_are_evicted_before_live_ones() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(2, Arc::new(clock.clone()));
        let short = entry(&clock, "short", Duration::from_millis(10));
        let long = entry(&clock, "long", Duration::from_secs(60));
        cache.insert(long.clone());
        cache.insert(short.clone());

        clock.advance(Duration::from_millis(20));
        let next = entry(&clock, "next", Duration::from_secs(60));
        cache.insert(next.clone());

        assert!(cache.get(&long.key).is_some());
        assert!(cache.get(&next.key).is_some());
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(1, Arc::new(clock.clone()));
        let a = entry(&clock, "a", Duration::from_secs(60));
        cache.insert(a.clone());
        cache.insert(a.clone());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&a.key).is_some());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(0, Arc::new(clock.clone()));
        let a = entry(&clock, "a", Duration::from_secs(60));
        cache.insert(a.clone());
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn purge_and_clear_remove_entries() {
        let clock = ManualClock::default();
        let cache = MemoryCache::new(8, Arc::new(clock.clone()));
        cache.insert(entry(&clock, "a", Duration::from_millis(5)));
        cache.insert(entry(&clock, "b", Duration::from_secs(60)));
        clock.advance(Duration::from_millis(10));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}

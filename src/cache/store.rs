//! Cache Store Module
//!
//! The entry table: a HashMap of slots combined with LRU tracking for the
//! size bound and write/access ordering for expiration.
//!
//! The store is synchronous and single-owner. Concurrency comes from the
//! owning cache, which keeps it behind an async `RwLock`. Operations that
//! remove entries append a [`RemovalNotification`] to a caller-supplied
//! buffer so listeners run after the lock is released.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::time::Instant;

use crate::cache::entry::{CacheEntry, Slot};
use crate::cache::loader::LoadHandle;
use crate::cache::removal::{RemovalCause, RemovalNotification};
use crate::cache::{CacheStats, LruTracker};
use crate::config::CacheConfig;

/// Outcome of a read against the table.
pub enum Lookup<V> {
    /// A fresh value; `refresh` carries the entry id when a refresh-ahead
    /// reload should be started
    Hit { value: V, refresh: Option<u64> },
    /// A load is in flight for the key; counted by [`CacheStore::record_join`]
    /// once it resolves
    Pending(LoadHandle<V>),
    /// Nothing usable (absent or expired)
    Miss,
}

// == Cache Store ==
/// Entry table with LRU eviction and expiration support.
pub struct CacheStore<K, V> {
    /// Key to slot storage
    entries: HashMap<K, Slot<V>>,
    /// Loaded keys by last access; drives eviction and access expiry
    access_order: LruTracker<K>,
    /// Loaded keys by last write; drives write expiry
    write_order: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    config: CacheConfig,
    /// Source of entry and load ids
    next_id: u64,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: LruTracker::new(),
            write_order: LruTracker::new(),
            stats: CacheStats::new(),
            config,
            next_id: 0,
        }
    }

    /// Allocates an id for a new entry or load.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // == Get ==
    /// Reads a key.
    ///
    /// A hit refreshes the access time and recency. An expired entry is
    /// removed and reported as a miss. When the entry is due for refresh it
    /// is flagged as refreshing so only one reload starts.
    pub fn get(
        &mut self,
        key: &K,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> Lookup<V> {
        let CacheConfig {
            expire_after_write,
            expire_after_access,
            refresh_after_write,
            ..
        } = self.config;

        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return Lookup::Miss;
            }
            Some(Slot::Loading { handle, .. }) => {
                return Lookup::Pending(handle.clone());
            }
            Some(Slot::Loaded(entry)) => {
                entry.is_expired(now, expire_after_write, expire_after_access)
            }
        };

        if expired {
            self.remove_with_cause(key, RemovalCause::Expired, removed);
            self.stats.record_miss();
            return Lookup::Miss;
        }

        let Some(Slot::Loaded(entry)) = self.entries.get_mut(key) else {
            return Lookup::Miss;
        };
        entry.touch(now);
        let refresh = if entry.needs_refresh(now, refresh_after_write) {
            entry.refreshing = true;
            Some(entry.id)
        } else {
            None
        };
        let value = entry.value.clone();

        self.access_order.touch(key);
        self.stats.record_hit();
        Lookup::Hit { value, refresh }
    }

    /// Counts a read that joined an in-flight load: a hit if the load
    /// produced a value, a miss otherwise.
    pub fn record_join(&mut self, loaded: bool) {
        if loaded {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
    }

    // == Begin Load ==
    /// Installs a placeholder for a load in flight.
    pub fn begin_load(&mut self, key: K, id: u64, handle: LoadHandle<V>) {
        self.entries.insert(key, Slot::Loading { id, handle });
    }

    // == Complete Load ==
    /// Turns the placeholder `id` into a loaded entry.
    ///
    /// Returns false if the placeholder was invalidated or replaced in the
    /// meantime; the value is then discarded.
    pub fn complete_load(
        &mut self,
        key: &K,
        id: u64,
        value: V,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> bool {
        self.stats.record_load_success();
        if !self.holds_load(key, id) {
            return false;
        }

        self.expire_entries(now, removed);
        self.entries
            .insert(key.clone(), Slot::Loaded(CacheEntry::new(value, id, now)));
        self.access_order.touch(key);
        self.write_order.touch(key);
        self.evict_to_capacity(removed);
        true
    }

    // == Fail Load ==
    /// Drops the placeholder `id` so the next read retries.
    pub fn fail_load(&mut self, key: &K, id: u64) -> bool {
        self.stats.record_load_failure();
        if !self.holds_load(key, id) {
            return false;
        }
        self.entries.remove(key);
        true
    }

    // == Insert ==
    /// Stores a value, replacing any entry or placeholder for the key.
    ///
    /// Replacing a loaded entry reports the old value as `Replaced`. If the
    /// cache is over capacity afterwards, the least recently used entry is
    /// evicted.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) {
        self.expire_entries(now, removed);
        let id = self.next_id();

        match self.entries.get_mut(&key) {
            Some(Slot::Loaded(entry)) => {
                let previous = entry.replace(value, now);
                entry.id = id;
                removed.push(RemovalNotification::new(
                    key.clone(),
                    previous,
                    RemovalCause::Replaced,
                ));
            }
            _ => {
                self.entries
                    .insert(key.clone(), Slot::Loaded(CacheEntry::new(value, id, now)));
            }
        }

        self.access_order.touch(&key);
        self.write_order.touch(&key);
        self.evict_to_capacity(removed);
    }

    // == Insert If Absent ==
    /// Stores a value only if nothing (not even a load) is held for the key.
    pub fn insert_if_absent(
        &mut self,
        key: K,
        value: V,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> bool {
        self.expire_entries(now, removed);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.insert(key, value, now, removed);
        true
    }

    // == Refresh ==
    /// Flags a loaded entry for an explicit reload.
    ///
    /// Returns the entry id to reload, or None if the key is absent, loading
    /// or already refreshing. An expired entry is removed first.
    pub fn start_refresh(
        &mut self,
        key: &K,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> Option<u64> {
        let expired = match self.entries.get(key) {
            Some(Slot::Loaded(entry)) => entry.is_expired(
                now,
                self.config.expire_after_write,
                self.config.expire_after_access,
            ),
            _ => return None,
        };
        if expired {
            self.remove_with_cause(key, RemovalCause::Expired, removed);
            return None;
        }

        match self.entries.get_mut(key) {
            Some(Slot::Loaded(entry)) if !entry.refreshing => {
                entry.refreshing = true;
                Some(entry.id)
            }
            _ => None,
        }
    }

    /// Swaps a refreshed value into entry `id`.
    ///
    /// Returns false if the entry was replaced or removed while reloading.
    pub fn complete_refresh(
        &mut self,
        key: &K,
        id: u64,
        value: V,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> bool {
        self.stats.record_load_success();
        match self.entries.get_mut(key) {
            Some(Slot::Loaded(entry)) if entry.id == id => {
                let previous = entry.replace(value, now);
                removed.push(RemovalNotification::new(
                    key.clone(),
                    previous,
                    RemovalCause::Replaced,
                ));
            }
            _ => return false,
        }
        self.access_order.touch(key);
        self.write_order.touch(key);
        true
    }

    /// Clears the refreshing flag of entry `id`, keeping the stale value.
    pub fn fail_refresh(&mut self, key: &K, id: u64) {
        self.stats.record_load_failure();
        if let Some(Slot::Loaded(entry)) = self.entries.get_mut(key) {
            if entry.id == id {
                entry.refreshing = false;
            }
        }
    }

    // == Remove ==
    /// Explicitly removes a key.
    ///
    /// A placeholder is dropped silently; its load still completes for the
    /// callers awaiting it but is not installed. Returns true if a loaded
    /// entry was removed.
    pub fn remove(&mut self, key: &K, removed: &mut Vec<RemovalNotification<K, V>>) -> bool {
        self.remove_with_cause(key, RemovalCause::Explicit, removed)
    }

    // == Clear ==
    /// Removes every entry and placeholder, oldest entries reported first.
    pub fn clear(&mut self, removed: &mut Vec<RemovalNotification<K, V>>) -> usize {
        let keys: Vec<K> = self.access_order.iter().cloned().collect();
        for key in &keys {
            self.remove_with_cause(key, RemovalCause::Explicit, removed);
        }
        self.entries.clear();
        self.access_order.clear();
        self.write_order.clear();
        keys.len()
    }

    // == Expire Entries ==
    /// Removes all expired entries.
    ///
    /// Both orders are sorted by their timestamp, so the sweep stops at the
    /// first fresh entry of each. Returns the number of entries removed.
    pub fn expire_entries(
        &mut self,
        now: Instant,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> usize {
        let mut count = 0;

        if let Some(ttl) = self.config.expire_after_write {
            while let Some(key) = self.write_order.peek_oldest().cloned() {
                let expired = matches!(
                    self.entries.get(&key),
                    Some(Slot::Loaded(entry)) if entry.is_write_expired(now, Some(ttl))
                );
                if !expired {
                    break;
                }
                self.remove_with_cause(&key, RemovalCause::Expired, removed);
                count += 1;
            }
        }

        if let Some(ttl) = self.config.expire_after_access {
            while let Some(key) = self.access_order.peek_oldest().cloned() {
                let expired = matches!(
                    self.entries.get(&key),
                    Some(Slot::Loaded(entry)) if entry.is_access_expired(now, Some(ttl))
                );
                if !expired {
                    break;
                }
                self.remove_with_cause(&key, RemovalCause::Expired, removed);
                count += 1;
            }
        }

        count
    }

    // == Snapshot ==
    /// Copies the fresh entries, least recently used first. Does not count
    /// as access.
    pub fn snapshot(&self, now: Instant) -> Vec<(K, V)> {
        self.access_order
            .iter()
            .filter_map(|key| match self.entries.get(key) {
                Some(Slot::Loaded(entry)) if !self.is_expired(entry, now) => {
                    Some((key.clone(), entry.value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Checks for a fresh loaded entry without touching it.
    pub fn contains_key(&self, key: &K, now: Instant) -> bool {
        matches!(
            self.entries.get(key),
            Some(Slot::Loaded(entry)) if !self.is_expired(entry, now)
        )
    }

    /// Checks for any slot, loaded or loading.
    pub fn has_slot(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.len());
        stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Length ==
    /// Returns the number of loaded entries, expired ones included until
    /// they are swept.
    pub fn len(&self) -> usize {
        self.access_order.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.access_order.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        entry.is_expired(
            now,
            self.config.expire_after_write,
            self.config.expire_after_access,
        )
    }

    fn holds_load(&self, key: &K, id: u64) -> bool {
        matches!(self.entries.get(key), Some(Slot::Loading { id: current, .. }) if *current == id)
    }

    fn evict_to_capacity(&mut self, removed: &mut Vec<RemovalNotification<K, V>>) {
        while self.access_order.len() as u64 > self.config.maximum_size {
            let Some(victim) = self.access_order.peek_oldest().cloned() else {
                break;
            };
            self.remove_with_cause(&victim, RemovalCause::Size, removed);
        }
    }

    fn remove_with_cause(
        &mut self,
        key: &K,
        cause: RemovalCause,
        removed: &mut Vec<RemovalNotification<K, V>>,
    ) -> bool {
        self.access_order.remove(key);
        self.write_order.remove(key);

        let Some(Slot::Loaded(entry)) = self.entries.remove(key) else {
            return false;
        };
        match cause {
            RemovalCause::Size => self.stats.record_eviction(),
            RemovalCause::Expired => self.stats.record_expiration(),
            RemovalCause::Explicit | RemovalCause::Replaced => {}
        }
        removed.push(RemovalNotification::new(key.clone(), entry.value, cause));
        true
    }
}

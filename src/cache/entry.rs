//! Cache Entry Module
//!
//! Defines the state kept per key: a loaded entry with its timestamps, or a
//! placeholder for a load still in flight.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::loader::LoadHandle;

// == Cache Entry ==
/// A loaded value with its expiration metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Identity of this entry, used to discard stale refresh results
    pub id: u64,
    /// Last time the value was written (insert, replace or refresh)
    pub write_time: Instant,
    /// Last time the value was read or written
    pub access_time: Instant,
    /// Whether a refresh-ahead reload is currently running
    pub refreshing: bool,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, id: u64, now: Instant) -> Self {
        Self {
            value,
            id,
            write_time: now,
            access_time: now,
            refreshing: false,
        }
    }

    // == Is Expired ==
    /// Checks the entry against both expiry settings; the most restrictive wins.
    ///
    /// Boundary condition: an entry is expired once the configured duration has
    /// fully elapsed, i.e. when `now - timestamp >= duration`.
    pub fn is_expired(
        &self,
        now: Instant,
        after_write: Option<Duration>,
        after_access: Option<Duration>,
    ) -> bool {
        self.is_write_expired(now, after_write) || self.is_access_expired(now, after_access)
    }

    pub fn is_write_expired(&self, now: Instant, after_write: Option<Duration>) -> bool {
        after_write.is_some_and(|ttl| now.saturating_duration_since(self.write_time) >= ttl)
    }

    pub fn is_access_expired(&self, now: Instant, after_access: Option<Duration>) -> bool {
        after_access.is_some_and(|ttl| now.saturating_duration_since(self.access_time) >= ttl)
    }

    /// Returns true when the value is old enough to reload and no reload is running.
    pub fn needs_refresh(&self, now: Instant, refresh_after_write: Option<Duration>) -> bool {
        !self.refreshing
            && refresh_after_write
                .is_some_and(|age| now.saturating_duration_since(self.write_time) >= age)
    }

    /// Records a read.
    pub fn touch(&mut self, now: Instant) {
        self.access_time = now;
    }

    /// Swaps in a new value, resetting both timestamps.
    ///
    /// Returns the previous value.
    pub fn replace(&mut self, value: V, now: Instant) -> V {
        self.write_time = now;
        self.access_time = now;
        self.refreshing = false;
        std::mem::replace(&mut self.value, value)
    }
}

// == Slot ==
/// What the entry table holds for a key.
pub enum Slot<V> {
    /// A load is in flight; concurrent readers await the shared handle
    Loading { id: u64, handle: LoadHandle<V> },
    /// A value is present
    Loaded(CacheEntry<V>),
}

impl<V: fmt::Debug> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Loading { id, .. } => f
                .debug_struct("Loading")
                .field("id", id)
                .finish_non_exhaustive(),
            Slot::Loaded(entry) => f.debug_tuple("Loaded").field(entry).finish(),
        }
    }
}

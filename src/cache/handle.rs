//! Cache Handles
//!
//! The public asynchronous surface. Every operation is a lazy future that
//! resolves once: to a value, to `None` for absent, or to an error.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::builder::CacheBuilder;
use crate::cache::loader::{Core, Loader};
use crate::cache::store::Lookup;
use crate::cache::CacheStats;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache ==
/// Concurrent cache whose values are supplied by `put` or per-call loaders.
///
/// Cloning is cheap and every clone refers to the same entries.
pub struct Cache<K, V> {
    pub(crate) core: Arc<Core<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts building a cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    pub(crate) fn from_core(core: Core<K, V>) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    // == Get If Present ==
    /// Returns the value if present and fresh.
    ///
    /// A load already in flight for the key is awaited; if it fails the key
    /// is reported absent.
    pub async fn get_if_present(&self, key: &K) -> Option<V> {
        let mut removed = Vec::new();
        let lookup = {
            let mut store = self.core.store.write().await;
            store.get(key, Instant::now(), &mut removed)
        };
        self.core.notify(removed);

        match lookup {
            Lookup::Hit { value, refresh } => {
                if let Some(id) = refresh {
                    self.core.spawn_refresh(key.clone(), id);
                }
                Some(value)
            }
            Lookup::Pending(handle) => self.core.join(handle).await.ok(),
            Lookup::Miss => None,
        }
    }

    // == Get With ==
    /// Returns the value for `key`, computing it with `init` on a miss.
    ///
    /// Concurrent callers for the same key share one invocation of the first
    /// caller's `init`.
    pub async fn get_with<F, Fut>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.core.get_or_load(key, |k| init(k).boxed()).await
    }

    // == Put ==
    /// Stores a value, replacing any previous one.
    pub async fn put(&self, key: K, value: V) {
        let mut removed = Vec::new();
        {
            let mut store = self.core.store.write().await;
            store.insert(key, value, Instant::now(), &mut removed);
        }
        self.core.notify(removed);
    }

    /// Stores the value produced by `value` once it resolves.
    ///
    /// The key is untouched until then: readers do not wait on this future.
    /// An error is returned as is and nothing is stored.
    pub async fn put_future<F, E>(&self, key: K, value: F) -> std::result::Result<(), E>
    where
        F: Future<Output = std::result::Result<V, E>>,
    {
        let value = value.await?;
        self.put(key, value).await;
        Ok(())
    }

    /// Stores a value only if the key has no entry and no load in flight.
    ///
    /// Returns true if the value was stored.
    pub async fn put_if_absent(&self, key: K, value: V) -> bool {
        let mut removed = Vec::new();
        let inserted = {
            let mut store = self.core.store.write().await;
            store.insert_if_absent(key, value, Instant::now(), &mut removed)
        };
        self.core.notify(removed);
        inserted
    }

    // == Invalidate ==
    /// Removes a key. Absent keys are ignored.
    pub async fn invalidate(&self, key: &K) {
        let mut removed = Vec::new();
        {
            let mut store = self.core.store.write().await;
            store.remove(key, &mut removed);
        }
        self.core.notify(removed);
    }

    /// Removes each of `keys`.
    pub async fn invalidate_many<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut removed = Vec::new();
        {
            let mut store = self.core.store.write().await;
            for key in keys {
                store.remove(key, &mut removed);
            }
        }
        self.core.notify(removed);
    }

    /// Removes every entry.
    pub async fn invalidate_all(&self) {
        let mut removed = Vec::new();
        let count = {
            let mut store = self.core.store.write().await;
            store.clear(&mut removed)
        };
        debug!(count, "invalidated all entries");
        self.core.notify(removed);
    }

    // == Clean Up ==
    /// Removes expired entries now instead of waiting for traffic.
    ///
    /// Returns the number of entries removed.
    pub async fn clean_up(&self) -> usize {
        let mut removed = Vec::new();
        let count = {
            let mut store = self.core.store.write().await;
            store.expire_entries(Instant::now(), &mut removed)
        };
        self.core.notify(removed);
        count
    }

    /// Number of loaded entries, including expired ones not yet swept.
    pub async fn estimated_size(&self) -> usize {
        self.core.store.read().await.len()
    }

    /// Checks for a fresh entry without counting a read.
    pub async fn contains_key(&self, key: &K) -> bool {
        self.core.store.read().await.contains_key(key, Instant::now())
    }

    /// Copies the fresh entries, least recently used first.
    pub async fn snapshot(&self) -> Vec<(K, V)> {
        self.core.store.read().await.snapshot(Instant::now())
    }

    pub async fn stats(&self) -> CacheStats {
        self.core.store.read().await.stats()
    }

    pub async fn config(&self) -> CacheConfig {
        self.core.store.read().await.config().clone()
    }
}

// == Loading Cache ==
/// Cache that computes missing values with the loader given at build time.
///
/// Dereferences to [`Cache`] for the non-loading operations.
pub struct LoadingCache<K, V> {
    cache: Cache<K, V>,
    loader: Loader<K, V>,
}

impl<K, V> Clone for LoadingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts building a cache; finish with [`CacheBuilder::build_loading`].
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    pub(crate) fn new(cache: Cache<K, V>, loader: Loader<K, V>) -> Self {
        Self { cache, loader }
    }

    // == Get ==
    /// Returns the value for `key`, loading it on a miss.
    ///
    /// Concurrent callers for the same key share a single load. A failed
    /// load is reported to all of them and is not cached.
    pub async fn get(&self, key: K) -> Result<V> {
        let loader = Arc::clone(&self.loader);
        self.cache.core.get_or_load(key, move |k| loader(k)).await
    }

    /// Loads several keys concurrently. Fails with the first load error.
    pub async fn get_all<I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        I: IntoIterator<Item = K>,
    {
        let loads = keys.into_iter().map(|key| async move {
            let value = self.get(key.clone()).await?;
            Ok::<_, CacheError>((key, value))
        });
        join_all(loads).await.into_iter().collect()
    }

    /// Reloads `key` in the background, loading it if absent.
    ///
    /// The current value stays readable until the reload completes.
    pub async fn refresh(&self, key: K) {
        self.cache.core.refresh(key).await;
    }

    pub fn as_cache(&self) -> &Cache<K, V> {
        &self.cache
    }
}

impl<K, V> Deref for LoadingCache<K, V> {
    type Target = Cache<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

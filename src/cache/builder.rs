//! Cache Builder
//!
//! Collects settings, the loader and the removal listener, then validates
//! them once when the cache is built.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::handle::{Cache, LoadingCache};
use crate::cache::loader::{boxed_loader, Core, Loader};
use crate::cache::removal::{RemovalListener, RemovalNotification};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Builder ==
/// Builder for [`Cache`] and [`LoadingCache`].
///
/// # Example
/// ```ignore
/// let cache = LoadingCache::builder()
///     .maximum_size(10_000)
///     .expire_after_write(Duration::from_secs(300))
///     .loader(|id: u64| async move { fetch_user(id).await })
///     .build_loading()?;
/// ```
pub struct CacheBuilder<K, V> {
    config: CacheConfig,
    loader: Option<Loader<K, V>>,
    listener: Option<RemovalListener<K, V>>,
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            loader: None,
            listener: None,
        }
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all settings at once, e.g. with [`CacheConfig::from_env`].
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn maximum_size(mut self, maximum_size: u64) -> Self {
        self.config.maximum_size = maximum_size;
        self
    }

    pub fn expire_after_write(mut self, duration: Duration) -> Self {
        self.config.expire_after_write = Some(duration);
        self
    }

    pub fn expire_after_access(mut self, duration: Duration) -> Self {
        self.config.expire_after_access = Some(duration);
        self
    }

    /// Reloads entries older than `duration` in the background when read.
    /// Requires a loader.
    pub fn refresh_after_write(mut self, duration: Duration) -> Self {
        self.config.refresh_after_write = Some(duration);
        self
    }

    /// Sets the function computing missing values.
    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.loader = Some(boxed_loader(loader));
        self
    }

    /// Sets the callback receiving every removal.
    pub fn removal_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(RemovalNotification<K, V>) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    // == Build ==
    /// Builds a plain cache.
    pub fn build(self) -> Result<Cache<K, V>> {
        self.config.validate(self.loader.is_some())?;
        Ok(Cache::from_core(Core::new(
            self.config,
            self.loader,
            self.listener,
        )))
    }

    /// Builds a loading cache. Fails if no loader was set.
    pub fn build_loading(self) -> Result<LoadingCache<K, V>> {
        let loader = self.loader.clone().ok_or(CacheError::MissingLoader)?;
        let cache = self.build()?;
        Ok(LoadingCache::new(cache, loader))
    }
}

//! Loader Coordinator
//!
//! Runs loads so that each key has at most one in flight. The first caller
//! to miss installs a placeholder holding a shared handle and spawns the load
//! on the Tokio runtime; every other caller awaits the same handle. Because
//! the load runs on its own task, callers that stop waiting never cancel it.

use std::future::Future;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::removal::{self, RemovalListener, RemovalNotification};
use crate::cache::store::{CacheStore, Lookup};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Future produced by a loader.
pub type LoadFuture<V> = BoxFuture<'static, anyhow::Result<V>>;

/// Asynchronous function computing the value of a key.
pub type Loader<K, V> = Arc<dyn Fn(K) -> LoadFuture<V> + Send + Sync>;

/// Multi-waiter handle to a load in flight.
pub type LoadHandle<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Boxes a closure into a [`Loader`].
pub(crate) fn boxed_loader<K, V, F, Fut>(f: F) -> Loader<K, V>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

/// Creates the load future, turning a panic while building it into an error.
fn start<K, V, F>(make: F, key: K) -> LoadFuture<V>
where
    F: FnOnce(K) -> LoadFuture<V>,
    V: Send + 'static,
{
    match catch_unwind(AssertUnwindSafe(|| make(key))) {
        Ok(load) => load,
        Err(_) => future::ready(Err(anyhow::anyhow!("loader panicked"))).boxed(),
    }
}

/// Awaits a load, turning a panic while polling it into an error.
async fn guarded<V>(load: LoadFuture<V>) -> anyhow::Result<V> {
    match AssertUnwindSafe(load).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("loader panicked")),
    }
}

// == Core ==
/// State shared by every handle of one cache instance.
pub(crate) struct Core<K, V> {
    pub(crate) store: RwLock<CacheStore<K, V>>,
    loader: Option<Loader<K, V>>,
    listener: Option<RemovalListener<K, V>>,
}

impl<K, V> Core<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        config: CacheConfig,
        loader: Option<Loader<K, V>>,
        listener: Option<RemovalListener<K, V>>,
    ) -> Self {
        Self {
            store: RwLock::new(CacheStore::new(config)),
            loader,
            listener,
        }
    }

    /// Delivers removal notifications. Must be called without the store lock.
    pub(crate) fn notify(&self, removed: Vec<RemovalNotification<K, V>>) {
        if !removed.is_empty() {
            removal::dispatch(self.listener.as_ref(), removed);
        }
    }

    // == Get Or Load ==
    /// Returns the value for `key`, loading it with `make` on a miss.
    ///
    /// The lookup and the placeholder install happen under one lock
    /// acquisition, so concurrent callers can never start a second load.
    pub(crate) async fn get_or_load<F>(self: &Arc<Self>, key: K, make: F) -> Result<V>
    where
        F: FnOnce(K) -> LoadFuture<V>,
    {
        let mut removed = Vec::new();
        let handle = {
            let mut store = self.store.write().await;
            let lookup = store.get(&key, Instant::now(), &mut removed);
            match lookup {
                Lookup::Hit { value, refresh } => {
                    drop(store);
                    self.notify(removed);
                    if let Some(id) = refresh {
                        self.spawn_refresh(key, id);
                    }
                    return Ok(value);
                }
                Lookup::Pending(handle) => {
                    drop(store);
                    self.notify(removed);
                    return self.join(handle).await;
                }
                Lookup::Miss => {
                    let id = store.next_id();
                    let handle = self.spawn_load(key.clone(), id, start(make, key.clone()));
                    store.begin_load(key, id, handle.clone());
                    handle
                }
            }
        };
        self.notify(removed);
        handle.await
    }

    /// Awaits a load started by another caller, then counts the read as a
    /// hit or a miss depending on its outcome.
    pub(crate) async fn join(&self, handle: LoadHandle<V>) -> Result<V> {
        let result = handle.await;
        self.store.write().await.record_join(result.is_ok());
        result
    }

    /// Spawns the load for placeholder `id` and returns its shared handle.
    ///
    /// The task settles the placeholder itself (install or drop) before the
    /// handle resolves, so a waiter that reads again sees the outcome. If the
    /// task never finishes (its runtime shut down), the first waiter to see
    /// that drops the placeholder so the next read loads again.
    fn spawn_load(self: &Arc<Self>, key: K, id: u64, load: LoadFuture<V>) -> LoadHandle<V> {
        let waiter_core = Arc::clone(self);
        let waiter_key = key.clone();
        let core = Arc::clone(self);
        let task = tokio::spawn(async move {
            debug!(id, "load started");
            let outcome = guarded(load).await;

            let mut removed = Vec::new();
            let result = {
                let mut store = core.store.write().await;
                let now = Instant::now();
                match outcome {
                    Ok(value) => {
                        if !store.complete_load(&key, id, value.clone(), now, &mut removed) {
                            debug!(id, "load finished after its entry was replaced or invalidated");
                        }
                        Ok(value)
                    }
                    Err(err) => {
                        warn!(id, error = %err, "load failed");
                        store.fail_load(&key, id);
                        Err(CacheError::load_failed(err))
                    }
                }
            };
            core.notify(removed);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(id, error = %err, "load task did not finish");
                    waiter_core.store.write().await.fail_load(&waiter_key, id);
                    Err(CacheError::load_failed(
                        anyhow::Error::new(err).context("load task did not finish"),
                    ))
                }
            }
        }
        .boxed()
        .shared()
    }

    // == Refresh ==
    /// Reloads entry `id` in the background. Readers keep the current value
    /// until the reload lands; a failed reload keeps it for good.
    pub(crate) fn spawn_refresh(self: &Arc<Self>, key: K, id: u64) {
        let Some(loader) = self.loader.clone() else {
            return;
        };
        let core = Arc::clone(self);
        tokio::spawn(async move {
            debug!(id, "refresh started");
            let outcome = guarded(start(|k| loader(k), key.clone())).await;

            let mut removed = Vec::new();
            {
                let mut store = core.store.write().await;
                let now = Instant::now();
                match outcome {
                    Ok(value) => {
                        if !store.complete_refresh(&key, id, value, now, &mut removed) {
                            debug!(id, "refresh discarded; entry changed while reloading");
                        }
                    }
                    Err(err) => {
                        warn!(id, error = %err, "refresh failed; keeping current value");
                        store.fail_refresh(&key, id);
                    }
                }
            }
            core.notify(removed);
        });
    }

    /// Forces a reload of `key`, loading it if absent.
    ///
    /// Does nothing if a load or refresh is already running for the key.
    pub(crate) async fn refresh(self: &Arc<Self>, key: K) {
        let Some(loader) = self.loader.clone() else {
            return;
        };

        let mut removed = Vec::new();
        let refresh = {
            let mut store = self.store.write().await;
            let now = Instant::now();
            match store.start_refresh(&key, now, &mut removed) {
                Some(id) => Some(id),
                None if !store.has_slot(&key) => {
                    let id = store.next_id();
                    let load = start(|k| loader(k), key.clone());
                    let handle = self.spawn_load(key.clone(), id, load);
                    store.begin_load(key.clone(), id, handle);
                    None
                }
                None => None,
            }
        };
        self.notify(removed);

        if let Some(id) = refresh {
            self.spawn_refresh(key, id);
        }
    }
}

//! Maintenance Task
//!
//! Background task that periodically sweeps expired cache entries so that
//! idle keys are dropped and reported even when nobody reads them.

use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that periodically removes expired entries.
///
/// The task loops forever, sleeping for `interval` between runs. Abort the
/// returned handle to stop it.
///
/// # Example
/// ```ignore
/// let cache: Cache<String, String> = Cache::builder()
///     .expire_after_write(Duration::from_secs(60))
///     .build()?;
/// let maintenance = spawn_maintenance_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// maintenance.abort();
/// ```
pub fn spawn_maintenance_task<K, V>(cache: Cache<K, V>, interval: Duration) -> JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting cache maintenance task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.clean_up().await;

            if removed > 0 {
                info!("Maintenance: removed {} expired entries", removed);
            } else {
                debug!("Maintenance: no expired entries found");
            }
        }
    })
}

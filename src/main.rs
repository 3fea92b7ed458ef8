//! Flux Cache workload driver
//!
//! Runs concurrent readers against a loading cache with a simulated slow
//! loader, then prints the cache statistics as JSON.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flux_cache::{spawn_maintenance_task, Config, LoadingCache};

/// Main entry point for the workload driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the loading cache with a simulated loader
/// 4. Start background maintenance task
/// 5. Run the workers until done or until SIGINT/SIGTERM
/// 6. Print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flux_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flux Cache workload");

    let config = Config::from_env();
    info!(
        "Configuration loaded: maximum_size={}, workers={}, key_space={}, requests_per_worker={}",
        config.cache.maximum_size, config.workers, config.key_space, config.requests_per_worker
    );

    let latency = Duration::from_millis(config.load_latency_ms);
    let cache = LoadingCache::<u64, String>::builder()
        .config(config.cache.clone())
        .loader(move |key: u64| async move {
            tokio::time::sleep(latency).await;
            Ok(format!("value-{}", key))
        })
        .removal_listener(|n| debug!(key = n.key, cause = ?n.cause, "removed"))
        .build_loading()
        .context("invalid cache configuration")?;
    info!("Cache initialized");

    let maintenance =
        spawn_maintenance_task(cache.as_cache().clone(), config.maintenance_interval());

    tokio::select! {
        _ = run_workload(cache.clone(), &config) => {
            info!("Workload finished");
        }
        _ = shutdown_signal() => {}
    }

    maintenance.abort();

    let stats = cache.stats().await;
    info!(hit_rate = stats.hit_rate(), "Workload complete");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// Spawns the workers and waits for all of them.
async fn run_workload(cache: LoadingCache<u64, String>, config: &Config) {
    let mut workers = JoinSet::new();

    for worker in 0..config.workers as u64 {
        let cache = cache.clone();
        let key_space = config.key_space.max(1);
        let requests = config.requests_per_worker;

        workers.spawn(async move {
            let mut failures = 0u64;
            for i in 0..requests {
                // Quadratic stride skews reads toward a subset of keys
                let key = (worker * 7919 + i * i) % key_space;
                if cache.get(key).await.is_err() {
                    failures += 1;
                }
                if i % 1000 == 999 {
                    cache.invalidate(&key).await;
                }
            }
            failures
        });
    }

    while let Some(result) = workers.join_next().await {
        match result {
            Ok(0) => {}
            Ok(failures) => warn!(failures, "worker saw failed loads"),
            Err(e) => warn!("worker task failed: {}", e),
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

//! Configuration Module
//!
//! Cache settings plus the runtime parameters of the demo workload, loaded
//! from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Immutable cache settings, fixed once the cache is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of loaded entries; 0 disables retention entirely
    pub maximum_size: u64,
    /// Entries expire this long after their last write
    pub expire_after_write: Option<Duration>,
    /// Entries expire this long after their last read or write
    pub expire_after_access: Option<Duration>,
    /// Entries older than this are reloaded in the background on read
    pub refresh_after_write: Option<Duration>,
}

impl CacheConfig {
    /// Creates a CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAXIMUM_SIZE` - Maximum loaded entries (default: 1000)
    /// - `CACHE_EXPIRE_AFTER_WRITE_MS` - Write expiry in milliseconds (default: none)
    /// - `CACHE_EXPIRE_AFTER_ACCESS_MS` - Access expiry in milliseconds (default: none)
    /// - `CACHE_REFRESH_AFTER_WRITE_MS` - Refresh-ahead age in milliseconds (default: none)
    pub fn from_env() -> Self {
        Self {
            maximum_size: env_or("CACHE_MAXIMUM_SIZE", 1000),
            expire_after_write: env_millis("CACHE_EXPIRE_AFTER_WRITE_MS"),
            expire_after_access: env_millis("CACHE_EXPIRE_AFTER_ACCESS_MS"),
            refresh_after_write: env_millis("CACHE_REFRESH_AFTER_WRITE_MS"),
        }
    }

    /// Checks that the settings can back a cache.
    ///
    /// Refresh-ahead needs a loader to reload with, and a zero refresh age
    /// would reload on every read.
    pub fn validate(&self, has_loader: bool) -> Result<()> {
        match self.refresh_after_write {
            Some(_) if !has_loader => Err(CacheError::InvalidConfig(
                "refresh_after_write requires a loader".to_string(),
            )),
            Some(age) if age.is_zero() => Err(CacheError::InvalidConfig(
                "refresh_after_write must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maximum_size: 1000,
            expire_after_write: None,
            expire_after_access: None,
            refresh_after_write: None,
        }
    }
}

/// Runtime configuration for the `flux_cache` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings of the cache under load
    pub cache: CacheConfig,
    /// Number of concurrent worker tasks
    pub workers: usize,
    /// Number of distinct keys the workers read
    pub key_space: u64,
    /// Reads issued by each worker
    pub requests_per_worker: u64,
    /// Simulated loader latency in milliseconds
    pub load_latency_ms: u64,
    /// Interval between maintenance runs in milliseconds
    pub maintenance_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_*` - see [`CacheConfig::from_env`]
    /// - `WORKERS` - Concurrent workers (default: 8)
    /// - `KEY_SPACE` - Distinct keys (default: 2000)
    /// - `REQUESTS_PER_WORKER` - Reads per worker (default: 10000)
    /// - `LOAD_LATENCY_MS` - Simulated load latency (default: 5)
    /// - `MAINTENANCE_INTERVAL_MS` - Maintenance frequency (default: 1000)
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            workers: env_or("WORKERS", 8),
            key_space: env_or("KEY_SPACE", 2000),
            requests_per_worker: env_or("REQUESTS_PER_WORKER", 10_000),
            load_latency_ms: env_or("LOAD_LATENCY_MS", 5),
            maintenance_interval_ms: env_or("MAINTENANCE_INTERVAL_MS", 1000),
        }
    }

    /// Interval between maintenance runs.
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            workers: 8,
            key_space: 2000,
            requests_per_worker: 10_000,
            load_latency_ms: 5,
            maintenance_interval_ms: 1000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

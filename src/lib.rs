//! Flux Cache - A concurrent in-memory cache with asynchronous loading
//!
//! Provides single-flight loading, LRU size bounding, write and access
//! expiration, refresh-ahead and removal notifications.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    Cache, CacheBuilder, CacheStats, LoadingCache, RemovalCause, RemovalListener,
    RemovalNotification,
};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_maintenance_task;

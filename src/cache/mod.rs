//! Cache Module
//!
//! Concurrent in-memory caching with single-flight asynchronous loading,
//! LRU eviction, write/access expiration and refresh-ahead.

mod builder;
mod entry;
mod handle;
mod loader;
mod lru;
mod removal;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use builder::CacheBuilder;
pub use handle::{Cache, LoadingCache};
pub use loader::{LoadFuture, Loader};
pub use removal::{RemovalCause, RemovalListener, RemovalNotification};
pub use stats::CacheStats;

pub(crate) use lru::LruTracker;

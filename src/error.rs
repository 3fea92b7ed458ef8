//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Cloneable so that a single load outcome can be handed to every caller
/// waiting on the same key.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The loader returned an error or panicked
    #[error("Load failed: {0:#}")]
    LoadFailed(Arc<anyhow::Error>),

    /// A loading cache was built without a loader
    #[error("No loader configured")]
    MissingLoader,

    /// The builder was given an inconsistent configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background load task could not complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps a loader failure.
    pub fn load_failed(err: anyhow::Error) -> Self {
        CacheError::LoadFailed(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failed_display_includes_context() {
        let err = anyhow::anyhow!("connection refused").context("fetching user 42");
        let err = CacheError::load_failed(err);

        let message = err.to_string();
        assert!(message.starts_with("Load failed: fetching user 42"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_clone_shares_source() {
        let err = CacheError::load_failed(anyhow::anyhow!("boom"));
        let cloned = err.clone();

        match (err, cloned) {
            (CacheError::LoadFailed(a), CacheError::LoadFailed(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected LoadFailed"),
        }
    }
}

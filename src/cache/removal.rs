//! Removal Notification Module
//!
//! Describes why an entry left the cache and delivers that record to the
//! configured listener.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

// == Removal Cause ==
/// Why an entry was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Removed by `invalidate`, `invalidate_many` or `invalidate_all`
    Explicit,
    /// Overwritten by `put` or a completed refresh
    Replaced,
    /// Write or access expiry elapsed
    Expired,
    /// Evicted to honor the size bound
    Size,
}

impl RemovalCause {
    /// Returns true if the cache removed the entry on its own.
    pub fn was_evicted(self) -> bool {
        matches!(self, RemovalCause::Expired | RemovalCause::Size)
    }
}

// == Removal Notification ==
/// Record of a single removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalNotification<K, V> {
    pub key: K,
    pub value: V,
    pub cause: RemovalCause,
}

impl<K, V> RemovalNotification<K, V> {
    pub fn new(key: K, value: V, cause: RemovalCause) -> Self {
        Self { key, value, cause }
    }
}

/// Callback invoked once per removal.
pub type RemovalListener<K, V> = Arc<dyn Fn(RemovalNotification<K, V>) + Send + Sync>;

/// Delivers notifications in order.
///
/// A panicking listener is logged and skipped; the remaining notifications
/// are still delivered.
pub(crate) fn dispatch<K, V>(
    listener: Option<&RemovalListener<K, V>>,
    notifications: Vec<RemovalNotification<K, V>>,
) {
    for notification in notifications {
        let cause = notification.cause;
        debug!(?cause, "entry removed");

        if let Some(listener) = listener {
            if catch_unwind(AssertUnwindSafe(|| listener(notification))).is_err() {
                error!(?cause, "removal listener panicked; notification dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_was_evicted() {
        assert!(RemovalCause::Size.was_evicted());
        assert!(RemovalCause::Expired.was_evicted());
        assert!(!RemovalCause::Explicit.was_evicted());
        assert!(!RemovalCause::Replaced.was_evicted());
    }

    #[test]
    fn test_dispatch_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: RemovalListener<&str, u32> =
            Arc::new(move |n| sink.lock().unwrap().push((n.key, n.cause)));

        dispatch(
            Some(&listener),
            vec![
                RemovalNotification::new("a", 1, RemovalCause::Size),
                RemovalNotification::new("b", 2, RemovalCause::Explicit),
            ],
        );

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", RemovalCause::Size), ("b", RemovalCause::Explicit)]
        );
    }

    #[test]
    fn test_dispatch_isolates_panics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: RemovalListener<&str, u32> = Arc::new(move |n| {
            if n.key == "bad" {
                panic!("listener failure");
            }
            sink.lock().unwrap().push(n.key);
        });

        dispatch(
            Some(&listener),
            vec![
                RemovalNotification::new("bad", 1, RemovalCause::Explicit),
                RemovalNotification::new("good", 2, RemovalCause::Explicit),
            ],
        );

        assert_eq!(*seen.lock().unwrap(), vec!["good"]);
    }

    #[test]
    fn test_dispatch_without_listener() {
        dispatch::<&str, u32>(
            None,
            vec![RemovalNotification::new("a", 1, RemovalCause::Expired)],
        );
    }
}

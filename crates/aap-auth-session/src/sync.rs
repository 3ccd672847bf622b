//! Storage broadcast between same-origin windows.
//!
//! Windows never read each other's session directly. A window that changed
//! the token writes a fresh timestamp under [`COMM_KEY`]; every other window
//! sees the storage change and re-derives its session from the token.

use std::sync::Arc;

use parking_lot::Mutex;

use aap_auth::SharedStorage;
use aap_auth_core::ExpiresAt;

use crate::host::StorageEvent;

/// Storage key of the comm marker.
pub const COMM_KEY: &str = "AngularAapAuthUpdated";

/// Writer of strictly increasing marker timestamps.
pub struct CommMarker {
    storage: Arc<dyn SharedStorage>,
    last: Mutex<Option<i64>>,
}

impl CommMarker {
    /// Create a marker writing to `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn SharedStorage>) -> Self {
        Self {
            storage,
            last: Mutex::new(None),
        }
    }

    /// Write a new marker value based on the current time.
    pub fn bump(&self) -> i64 {
        self.bump_at(ExpiresAt::now().as_unix_millis())
    }

    /// Write a new marker value, using `now_ms` as the clock reading.
    ///
    /// The value is `now_ms`, or one more than the previous marker (ours or
    /// the one currently stored by any window) if that is larger.
    pub fn bump_at(&self, now_ms: i64) -> i64 {
        let next = {
            let mut last = self.last.lock();
            let stored = self
                .storage
                .get_item(COMM_KEY)
                .and_then(|value| value.trim().parse::<i64>().ok());
            let previous = match (*last, stored) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            let next = previous.map_or(now_ms, |p| now_ms.max(p.saturating_add(1)));
            *last = Some(next);
            next
        };

        // Written outside the lock: other windows react synchronously
        self.storage.set_item(COMM_KEY, &next.to_string());
        tracing::debug!(marker = next, "Comm marker updated");
        next
    }

    /// The last value this marker wrote.
    #[must_use]
    pub fn last(&self) -> Option<i64> {
        *self.last.lock()
    }
}

/// Returns true if `event` is a change of the comm marker.
#[must_use]
pub fn is_marker_event(event: &StorageEvent) -> bool {
    event.key.as_deref() == Some(COMM_KEY)
}

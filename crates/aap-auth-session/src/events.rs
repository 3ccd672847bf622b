//! Login and logout listener registries.
//!
//! Listeners are stored in registration order. Removing one leaves a
//! tombstone in its slot, so the ids handed out for every other listener
//! keep pointing at the same callback.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use aap_auth_core::ListenerId;

/// A login or logout callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Which session event a registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A token was accepted and a user published.
    Login,
    /// The session ended or a token was rejected.
    Logout,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Logout => write!(f, "logout"),
        }
    }
}

/// Ordered, tombstoned listener list for one event kind.
pub struct EventRegistry {
    kind: EventKind,
    slots: Vec<Option<Listener>>,
}

impl EventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
        }
    }

    /// The event kind this registry serves.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Register a listener and return its id.
    ///
    /// The id equals the number of slots (live or tombstoned) after
    /// insertion.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` listeners are registered.
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId::from_index(self.slots.len())
            .expect("listener registry exceeds u32::MAX entries");
        self.slots.push(Some(listener));
        id
    }

    /// Remove a listener. Returns false if `id` was never issued or was
    /// already removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.slots
            .get_mut(id.index())
            .and_then(Option::take)
            .is_some()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns true if no listener is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live listeners in registration order.
    ///
    /// Callers invoke the snapshot after releasing whatever lock guards the
    /// registry, so listeners may register or remove listeners themselves.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Listener> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Invoke `listeners` in order, isolating panics.
///
/// A panicking listener is logged and skipped; the rest still run.
/// Returns the number of listeners that completed normally.
pub fn invoke_all(kind: EventKind, listeners: &[Listener]) -> usize {
    let mut completed = 0;
    for (position, listener) in listeners.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| listener())) {
            Ok(()) => completed += 1,
            Err(_) => tracing::warn!(event = %kind, position, "Session listener panicked"),
        }
    }
    completed
}

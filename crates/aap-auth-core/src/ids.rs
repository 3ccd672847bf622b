//! Identifier types for aap-auth.
//!
//! Listener registrations are identified by a 1-based sequential id that
//! stays valid for the lifetime of the registry, no matter how many other
//! listeners are removed.

use std::fmt;
use std::num::NonZeroU32;

/// A stable, 1-based listener registration id.
///
/// The id equals the length of the listener sequence right after the
/// listener was added, so the first listener gets `1`, the second `2`, and
/// so on. Ids are never reused within one registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(NonZeroU32);

impl ListenerId {
    /// Create a `ListenerId` from its raw value.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Zero`] if `raw` is zero; ids are 1-based.
    pub fn new(raw: u32) -> Result<Self, IdError> {
        NonZeroU32::new(raw).map(Self).ok_or(IdError::Zero)
    }

    /// Create the id for the listener stored at a zero-based slot index.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Overflow`] if the index does not fit in a `u32` id.
    pub fn from_index(index: usize) -> Result<Self, IdError> {
        let raw = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .ok_or(IdError::Overflow)?;
        Self::new(raw)
    }

    /// Return the raw 1-based value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Return the zero-based slot index this id refers to.
    #[must_use]
    pub fn index(self) -> usize {
        // u32 always fits in usize on supported targets
        usize::try_from(self.0.get() - 1).unwrap_or(usize::MAX)
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur when building identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Listener ids start at 1.
    #[error("listener id must be greater than zero")]
    Zero,

    /// The registry grew past the largest representable id.
    #[error("listener id overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_id_is_one_based() {
        assert_eq!(ListenerId::new(0), Err(IdError::Zero));
        assert_eq!(ListenerId::new(1).unwrap().get(), 1);
        assert_eq!(ListenerId::new(1).unwrap().index(), 0);
    }

    #[test]
    fn listener_id_from_index() {
        let id = ListenerId::from_index(0).unwrap();
        assert_eq!(id.get(), 1);

        let id = ListenerId::from_index(41).unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.index(), 41);
    }

    #[test]
    fn listener_id_from_index_overflow() {
        let result = ListenerId::from_index(u32::MAX as usize);
        assert_eq!(result, Err(IdError::Overflow));
    }

    #[test]
    fn listener_id_ordering_follows_registration() {
        let first = ListenerId::new(1).unwrap();
        let second = ListenerId::new(2).unwrap();
        assert!(first < second);
    }
}

//! Token expiration instants.
//!
//! Expirations come from the `exp` claim of untrusted tokens, so every
//! conversion here saturates instead of overflowing: a token claiming to
//! expire in the year 30 million is simply "far in the future".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An instant expressed as milliseconds since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpiresAt(i64);

impl ExpiresAt {
    /// Create an instant from Unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Create an instant from Unix seconds, as found in a JWT `exp` claim.
    ///
    /// Fractional seconds are kept to millisecond precision. Non-finite or
    /// out-of-range values saturate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_unix_seconds(seconds: f64) -> Self {
        // float to int casts saturate and map NaN to 0
        Self((seconds * 1000.0) as i64)
    }

    /// The current wall-clock instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Return the raw Unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns true if this instant is at or before `now`.
    #[must_use]
    pub const fn is_expired_at(self, now: Self) -> bool {
        self.0 <= now.0
    }

    /// Time left between `now` and this instant, zero if already passed.
    #[must_use]
    pub fn remaining_from(self, now: Self) -> Duration {
        let millis = self.0.saturating_sub(now.0);
        Duration::from_millis(u64::try_from(millis).unwrap_or(0))
    }
}

impl fmt::Debug for ExpiresAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpiresAt({}ms)", self.0)
    }
}

impl fmt::Display for ExpiresAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

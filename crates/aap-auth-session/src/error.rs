//! Error types for the session layer.
//!
//! Session state itself never fails: decode errors, expiry and untrusted
//! messages all resolve to a state transition or are ignored. What remains
//! are identity API failures and login preparation errors, reported to the
//! caller with the session untouched.

use aap_auth::AuthError;
use thiserror::Error;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors returned by session coordinator operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a logged-in user.
    #[error("not logged in")]
    NotLoggedIn,

    /// The session changed while a request was in flight; its result was
    /// discarded.
    #[error("session changed during the request")]
    SessionChanged,

    /// The identity API or login preparation failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl SessionError {
    /// Returns the HTTP status code reported by the identity API, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotLoggedIn | Self::SessionChanged => None,
            Self::Auth(e) => e.status(),
        }
    }
}

//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while talking to the identity provider or
/// preparing a login.
///
/// Token decode failures only show up here when a decoder is called
/// directly; the [`TokenService`](crate::TokenService) adapter contains them.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token could not be decoded.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// The identity API rejected the credentials or token.
    #[error("unauthorized")]
    Unauthorized,

    /// The identity API refused the operation.
    #[error("forbidden")]
    Forbidden,

    /// The identity API answered with an unexpected status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// The response status code.
        status: u16,
        /// The response body, possibly empty.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// A login requested a token lifetime above the hard limit.
    #[error(
        "login requested with an expiration longer than {limit} minutes ({requested}); this is not allowed"
    )]
    TtlTooLong {
        /// The requested ttl, as given.
        requested: String,
        /// The hard limit in minutes.
        limit: u32,
    },

    /// A login option has an unusable value.
    #[error("invalid login option {key}: {value:?}")]
    InvalidOption {
        /// The option name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Returns the HTTP status code reported by the identity API, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the error was raised locally, before any request
    /// reached the identity API.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken(_)
                | Self::TtlTooLong { .. }
                | Self::InvalidOption { .. }
                | Self::InvalidConfig(_)
        )
    }
}

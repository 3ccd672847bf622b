//! The authenticated user.

use serde::{Deserialize, Serialize};

/// The user derived from a valid bearer token.
///
/// A `User` is never edited in place: every session recompute builds a new
/// value from the token claims. Claims missing from the token leave the
/// corresponding field empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id, from the `sub` claim.
    pub uid: String,
    /// Full name, from the `name` claim.
    pub name: String,
    /// Nickname, from the `nickname` claim.
    pub nickname: String,
    /// Email address, from the `email` claim.
    pub email: String,
    /// The bearer token the user was derived from.
    pub token: String,
}

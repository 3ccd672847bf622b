//! Core types shared by the aap-auth crates.
//!
//! This crate provides the small value types that flow between the token
//! layer (`aap-auth`) and the session layer (`aap-auth-session`):
//!
//! - **User**: the identity derived from a bearer token
//! - **Identifiers**: stable listener registration ids
//! - **Expiry**: token expiration instants with saturating arithmetic
//!
//! # Example
//!
//! ```
//! use aap_auth_core::{ExpiresAt, ListenerId};
//!
//! let id = ListenerId::new(1).unwrap();
//! assert_eq!(id.get(), 1);
//!
//! let expires_at = ExpiresAt::from_unix_seconds(1_518_083_433.0);
//! assert!(expires_at.is_expired_at(ExpiresAt::now()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod time;
pub mod user;

pub use ids::{IdError, ListenerId};
pub use time::ExpiresAt;
pub use user::User;

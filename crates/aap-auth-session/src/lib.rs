//! Session lifecycle coordination for aap-auth.
//!
//! This crate tracks the authenticated user of one application window,
//! derives it from the persisted bearer token, and keeps every same-origin
//! window in agreement about who is logged in.
//!
//! # Architecture
//!
//! ```text
//!   login / refresh / logout      identity provider        sibling window
//!   (application calls)           (popup message)          (storage event)
//!            │                           │                        │
//!            │                  origin check (drop others)  marker key only
//!            ▼                           ▼                        ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        SessionCoordinator                           │
//! │                           recompute()                               │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌────────────┐  │
//! │  │ TokenService │ │ SessionState │ │EventRegistry │ │  Expiry    │  │
//! │  │ (aap-auth)   │ │   (watch)    │ │login / logout│ │ Scheduler  │  │
//! │  └──────────────┘ └──────────────┘ └──────────────┘ └────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │                                                │
//!            ▼                                                ▼
//!     shared storage ◀──────── CommMarker bump ──────── timer fires log_out
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use aap_auth::AuthConfig;
//! use aap_auth_session::{MemoryBrowser, SessionCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = MemoryBrowser::new();
//! let window = browser.window("http://localhost:4200");
//!
//! let session = SessionCoordinator::new(AuthConfig::from_env(), Arc::new(window))?;
//! session.add_login_listener(|| println!("welcome"));
//!
//! let mut rx = session.subscribe();
//! session.open_login_tab(None)?;
//! rx.changed().await?;
//! println!("user: {:?}", *rx.borrow());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod events;
pub mod host;
pub mod memory;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod sync;
pub mod window;

pub use error::{Result, SessionError};
pub use events::{EventKind, EventRegistry, Listener};
pub use host::{
    HostWindow, MessageEvent, MessageHandler, ScreenSize, StorageEvent, StorageHandler,
    Subscription, WindowHandle,
};
pub use memory::{MemoryBrowser, MemoryPopup, MemoryWindow};
pub use scheduler::ExpiryScheduler;
pub use service::{SessionCoordinator, SessionCoordinatorBuilder};
pub use state::{SessionState, UserStream};
pub use sync::{CommMarker, COMM_KEY};
pub use window::{WindowGeometry, LOGIN_WINDOW_NAME};

// Re-export commonly used types from dependencies for convenience
pub use aap_auth::{AuthConfig, Credentials, LoginOptions, NewAccount, PasswordChange};
pub use aap_auth_core::{ExpiresAt, ListenerId, User};

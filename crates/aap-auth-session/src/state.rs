//! The reactive "current user" value.
//!
//! Backed by a `tokio::sync::watch` channel, which gives replay-latest
//! semantics for free: a subscriber attaching late sees the most recent
//! value immediately, then every later publish.

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use aap_auth_core::{ExpiresAt, User};

/// Stream of session values, starting with the current one.
pub type UserStream = WatchStream<Option<User>>;

/// The current user (or `None`) plus derived views.
pub struct SessionState {
    tx: watch::Sender<Option<User>>,
    expires_at: RwLock<Option<ExpiresAt>>,
}

impl SessionState {
    /// Create a logged-out state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            expires_at: RwLock::new(None),
        }
    }

    /// Publish a logged-in user whose token expires at `expires_at`.
    pub fn publish_user(&self, user: User, expires_at: ExpiresAt) {
        *self.expires_at.write() = Some(expires_at);
        self.tx.send_replace(Some(user));
    }

    /// Publish the logged-out state.
    ///
    /// Subscribers are notified even if the state was already logged out.
    pub fn publish_logged_out(&self) {
        *self.expires_at.write() = None;
        self.tx.send_replace(None);
    }

    /// The current user.
    #[must_use]
    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Expiry of the current user's token.
    #[must_use]
    pub fn expires_at(&self) -> Option<ExpiresAt> {
        *self.expires_at.read()
    }

    /// Subscribe to changes; the receiver starts at the current value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }

    /// Stream the current value, then every later one.
    #[must_use]
    pub fn stream(&self) -> UserStream {
        WatchStream::new(self.tx.subscribe())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn user(uid: &str) -> User {
        User {
            uid: uid.to_string(),
            name: String::new(),
            nickname: String::new(),
            email: String::new(),
            token: format!("token-{uid}"),
        }
    }

    #[test]
    fn starts_logged_out() {
        let state = SessionState::new();
        assert_eq!(state.current(), None);
        assert!(!state.is_authenticated());
        assert_eq!(state.expires_at(), None);
    }

    #[test]
    fn publish_updates_views() {
        let state = SessionState::new();
        let expiry = ExpiresAt::from_unix_millis(5_000);

        state.publish_user(user("usr-1"), expiry);
        assert_eq!(state.current(), Some(user("usr-1")));
        assert!(state.is_authenticated());
        assert_eq!(state.expires_at(), Some(expiry));

        state.publish_logged_out();
        assert!(!state.is_authenticated());
        assert_eq!(state.expires_at(), None);
    }

    #[test]
    fn late_subscriber_sees_latest() {
        let state = SessionState::new();
        state.publish_user(user("usr-1"), ExpiresAt::from_unix_millis(1));
        state.publish_user(user("usr-2"), ExpiresAt::from_unix_millis(2));

        let rx = state.subscribe();
        assert_eq!(rx.borrow().as_ref().map(|u| u.uid.as_str()), Some("usr-2"));
    }

    #[test]
    fn repeated_logout_still_notifies() {
        let state = SessionState::new();
        let rx = state.subscribe();
        assert!(!rx.has_changed().unwrap());

        state.publish_logged_out();
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn stream_replays_then_follows() {
        let state = SessionState::new();
        state.publish_user(user("usr-1"), ExpiresAt::from_unix_millis(1));

        let mut stream = state.stream();
        assert_eq!(stream.next().await, Some(Some(user("usr-1"))));

        state.publish_logged_out();
        assert_eq!(stream.next().await, Some(None));
    }
}

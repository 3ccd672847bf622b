//! Host environment capabilities.
//!
//! The coordinator never talks to a browser directly. Everything it needs
//! from its surroundings (origin, shared storage, window opening and the two
//! event sources) comes through [`HostWindow`], injected once at
//! construction.

use std::fmt;
use std::sync::Arc;

use aap_auth::SharedStorage;

/// A window the host opened on our behalf, or the sender of a message.
pub trait WindowHandle: Send + Sync {
    /// Close the window.
    fn close(&self);

    /// Bring the window to the front.
    fn focus(&self);
}

/// A cross-window message as delivered by the host.
#[derive(Clone)]
pub struct MessageEvent {
    /// Origin of the sending document (`scheme://host[:port]`).
    pub origin: String,
    /// Message payload. For login messages this is the raw token.
    pub data: String,
    /// The sending window, when the host can reference it.
    pub source: Option<Arc<dyn WindowHandle>>,
}

impl MessageEvent {
    /// Create a message without a source window.
    pub fn new(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            data: data.into(),
            source: None,
        }
    }

    /// Attach the sending window.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn WindowHandle>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("origin", &self.origin)
            .field("data_len", &self.data.len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// A change to shared storage made by another window.
///
/// `key` is `None` when the storage was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The changed key.
    pub key: Option<String>,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change.
    pub new_value: Option<String>,
}

/// Callback for cross-window messages.
pub type MessageHandler = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Callback for storage changes.
pub type StorageHandler = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// Screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScreenSize {
    /// Create a screen size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A registered host listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches the listener"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the closure that detaches a listener.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A subscription with nothing to detach.
    pub fn empty() -> Self {
        Self { detach: None }
    }

    /// Detach the listener now.
    pub fn cancel(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// What the coordinator needs from the window it runs in.
pub trait HostWindow: Send + Sync {
    /// Origin of the application document.
    fn origin(&self) -> String;

    /// Size of the screen the window is on.
    fn screen_size(&self) -> ScreenSize;

    /// Storage shared by every same-origin window.
    fn storage(&self) -> Arc<dyn SharedStorage>;

    /// Open a window or tab. Returns `None` if the host refused (for
    /// example a blocked popup).
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Arc<dyn WindowHandle>>;

    /// Listen for messages posted to this window.
    fn on_message(&self, handler: MessageHandler) -> Subscription;

    /// Listen for storage changes made by other windows.
    fn on_storage_change(&self, handler: StorageHandler) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscription_detaches_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let subscription = Subscription::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_detaches_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        {
            let _subscription = Subscription::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn message_debug_hides_payload() {
        let event = MessageEvent::new("https://api.aai.ebi.ac.uk", "secret-token");
        let debug = format!("{event:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("https://api.aai.ebi.ac.uk"));
    }
}

//! In-process host: a browser with same-origin windows sharing storage.
//!
//! Storage changes are delivered synchronously to every window except the
//! one that made the change, and only when the stored value actually
//! changed. Messages are delivered with [`MemoryWindow::post_message`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use aap_auth::SharedStorage;

use crate::host::{
    HostWindow, MessageEvent, MessageHandler, ScreenSize, StorageEvent, StorageHandler,
    Subscription, WindowHandle,
};

/// Screen size used by [`MemoryBrowser::window`].
pub const DEFAULT_SCREEN: ScreenSize = ScreenSize::new(1920, 1080);

/// A set of same-origin windows sharing one storage area.
#[derive(Clone, Default)]
pub struct MemoryBrowser {
    inner: Arc<BrowserInner>,
}

#[derive(Default)]
struct BrowserInner {
    items: Mutex<HashMap<String, String>>,
    windows: RwLock<Vec<Weak<WindowInner>>>,
    next_window: AtomicU64,
}

impl MemoryBrowser {
    /// Create a browser with empty storage and no windows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window at `origin` on a [`DEFAULT_SCREEN`].
    #[must_use]
    pub fn window(&self, origin: impl Into<String>) -> MemoryWindow {
        self.window_with_screen(origin, DEFAULT_SCREEN)
    }

    /// Open a window at `origin` on a screen of the given size.
    #[must_use]
    pub fn window_with_screen(&self, origin: impl Into<String>, screen: ScreenSize) -> MemoryWindow {
        let inner = Arc::new(WindowInner {
            id: self.inner.next_window.fetch_add(1, Ordering::Relaxed) + 1,
            origin: origin.into(),
            screen,
            message_handlers: Mutex::new(Vec::new()),
            storage_handlers: Mutex::new(Vec::new()),
            next_handler: AtomicU64::new(0),
            opened: Mutex::new(Vec::new()),
            popups_blocked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            focus_count: AtomicUsize::new(0),
        });

        let mut windows = self.inner.windows.write();
        windows.retain(|w| w.strong_count() > 0);
        windows.push(Arc::downgrade(&inner));
        drop(windows);

        MemoryWindow {
            inner,
            browser: Arc::clone(&self.inner),
        }
    }

    /// Storage access from outside any window. Changes made through it are
    /// delivered to every window.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn SharedStorage> {
        Arc::new(WindowStorage {
            browser: Arc::clone(&self.inner),
            writer: None,
        })
    }

    /// Remove every key, notifying all windows with a keyless event.
    pub fn clear_storage(&self) {
        let had_items = {
            let mut items = self.inner.items.lock();
            let had_items = !items.is_empty();
            items.clear();
            had_items
        };
        if had_items {
            self.inner.dispatch(
                None,
                &StorageEvent {
                    key: None,
                    old_value: None,
                    new_value: None,
                },
            );
        }
    }
}

impl BrowserInner {
    fn dispatch(&self, writer: Option<u64>, event: &StorageEvent) {
        let windows: Vec<Arc<WindowInner>> = self
            .windows
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|w| Some(w.id) != writer && !w.closed.load(Ordering::SeqCst))
            .collect();

        // Handlers run without any browser lock held; they may write storage
        let mut handlers: Vec<StorageHandler> = Vec::new();
        for window in &windows {
            handlers.extend(window.storage_handlers.lock().iter().map(|(_, h)| Arc::clone(h)));
        }

        for handler in handlers {
            handler(event);
        }
    }
}

/// Storage as seen from one window.
struct WindowStorage {
    browser: Arc<BrowserInner>,
    writer: Option<u64>,
}

impl SharedStorage for WindowStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.browser.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let old_value = self
            .browser
            .items
            .lock()
            .insert(key.to_string(), value.to_string());
        if old_value.as_deref() == Some(value) {
            return;
        }
        self.browser.dispatch(
            self.writer,
            &StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: Some(value.to_string()),
            },
        );
    }

    fn remove_item(&self, key: &str) {
        let old_value = self.browser.items.lock().remove(key);
        if old_value.is_none() {
            return;
        }
        self.browser.dispatch(
            self.writer,
            &StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: None,
            },
        );
    }
}

struct WindowInner {
    id: u64,
    origin: String,
    screen: ScreenSize,
    message_handlers: Mutex<Vec<(u64, MessageHandler)>>,
    storage_handlers: Mutex<Vec<(u64, StorageHandler)>>,
    next_handler: AtomicU64,
    opened: Mutex<Vec<Arc<MemoryPopup>>>,
    popups_blocked: AtomicBool,
    closed: AtomicBool,
    focus_count: AtomicUsize,
}

/// One window of a [`MemoryBrowser`].
#[derive(Clone)]
pub struct MemoryWindow {
    inner: Arc<WindowInner>,
    browser: Arc<BrowserInner>,
}

impl MemoryWindow {
    /// Deliver a message to this window's message listeners.
    pub fn post_message(&self, origin: impl Into<String>, data: impl Into<String>) {
        self.deliver(&MessageEvent::new(origin, data));
    }

    /// Deliver a message with a source window attached.
    pub fn post_message_from(
        &self,
        origin: impl Into<String>,
        data: impl Into<String>,
        source: Arc<dyn WindowHandle>,
    ) {
        self.deliver(&MessageEvent::new(origin, data).with_source(source));
    }

    fn deliver(&self, event: &MessageEvent) {
        if self.is_closed() {
            return;
        }
        let handlers: Vec<MessageHandler> = self
            .inner
            .message_handlers
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    /// Windows opened from this window, oldest first.
    #[must_use]
    pub fn opened(&self) -> Vec<Arc<MemoryPopup>> {
        self.inner.opened.lock().clone()
    }

    /// Make [`HostWindow::open`] refuse to open windows.
    pub fn block_popups(&self, blocked: bool) {
        self.inner.popups_blocked.store(blocked, Ordering::SeqCst);
    }

    /// Number of attached message listeners.
    #[must_use]
    pub fn message_listener_count(&self) -> usize {
        self.inner.message_handlers.lock().len()
    }

    /// Number of attached storage listeners.
    #[must_use]
    pub fn storage_listener_count(&self) -> usize {
        self.inner.storage_handlers.lock().len()
    }

    /// Returns true once the window has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of times the window was focused.
    #[must_use]
    pub fn focus_count(&self) -> usize {
        self.inner.focus_count.load(Ordering::SeqCst)
    }

    fn next_handler_id(&self) -> u64 {
        self.inner.next_handler.fetch_add(1, Ordering::Relaxed)
    }
}

impl HostWindow for MemoryWindow {
    fn origin(&self) -> String {
        self.inner.origin.clone()
    }

    fn screen_size(&self) -> ScreenSize {
        self.inner.screen
    }

    fn storage(&self) -> Arc<dyn SharedStorage> {
        Arc::new(WindowStorage {
            browser: Arc::clone(&self.browser),
            writer: Some(self.inner.id),
        })
    }

    fn open(&self, url: &str, name: &str, features: &str) -> Option<Arc<dyn WindowHandle>> {
        if self.inner.popups_blocked.load(Ordering::SeqCst) {
            return None;
        }
        let popup = Arc::new(MemoryPopup {
            url: url.to_string(),
            name: name.to_string(),
            features: features.to_string(),
            closed: AtomicBool::new(false),
            focus_count: AtomicUsize::new(0),
        });
        self.inner.opened.lock().push(Arc::clone(&popup));
        Some(popup)
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        let id = self.next_handler_id();
        self.inner.message_handlers.lock().push((id, handler));
        let window = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(window) = window.upgrade() {
                window.message_handlers.lock().retain(|(h, _)| *h != id);
            }
        })
    }

    fn on_storage_change(&self, handler: StorageHandler) -> Subscription {
        let id = self.next_handler_id();
        self.inner.storage_handlers.lock().push((id, handler));
        let window = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(window) = window.upgrade() {
                window.storage_handlers.lock().retain(|(h, _)| *h != id);
            }
        })
    }
}

impl WindowHandle for MemoryWindow {
    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn focus(&self) {
        self.inner.focus_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A window opened through [`HostWindow::open`] on a [`MemoryWindow`].
#[derive(Debug)]
pub struct MemoryPopup {
    url: String,
    name: String,
    features: String,
    closed: AtomicBool,
    focus_count: AtomicUsize,
}

impl MemoryPopup {
    /// URL the window was opened at.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Target name passed to `open`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature string passed to `open`.
    #[must_use]
    pub fn features(&self) -> &str {
        &self.features
    }

    /// Returns true once the window has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of times the window was focused.
    #[must_use]
    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }
}

impl WindowHandle for MemoryPopup {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "http://localhost:4200";

    fn recording_storage_handler(log: &Arc<Mutex<Vec<StorageEvent>>>) -> StorageHandler {
        let log = Arc::clone(log);
        Arc::new(move |event: &StorageEvent| log.lock().push(event.clone()))
    }

    #[test]
    fn windows_share_storage() {
        let browser = MemoryBrowser::new();
        let first = browser.window(APP);
        let second = browser.window(APP);

        first.storage().set_item("id_token", "abc");
        assert_eq!(second.storage().get_item("id_token").as_deref(), Some("abc"));
        assert_eq!(browser.storage().get_item("id_token").as_deref(), Some("abc"));
    }

    #[test]
    fn storage_events_skip_the_writer() {
        let browser = MemoryBrowser::new();
        let writer = browser.window(APP);
        let reader = browser.window(APP);

        let writer_log = Arc::new(Mutex::new(Vec::new()));
        let reader_log = Arc::new(Mutex::new(Vec::new()));
        let _w = writer.on_storage_change(recording_storage_handler(&writer_log));
        let _r = reader.on_storage_change(recording_storage_handler(&reader_log));

        writer.storage().set_item("marker", "1");

        assert!(writer_log.lock().is_empty());
        assert_eq!(
            *reader_log.lock(),
            vec![StorageEvent {
                key: Some("marker".to_string()),
                old_value: None,
                new_value: Some("1".to_string()),
            }]
        );
    }

    #[test]
    fn unchanged_values_raise_no_event() {
        let browser = MemoryBrowser::new();
        let writer = browser.window(APP);
        let reader = browser.window(APP);
        let log = Arc::new(Mutex::new(Vec::new()));
        let _r = reader.on_storage_change(recording_storage_handler(&log));

        writer.storage().set_item("k", "v");
        writer.storage().set_item("k", "v");
        writer.storage().remove_item("k");
        writer.storage().remove_item("k");

        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn external_writes_reach_every_window() {
        let browser = MemoryBrowser::new();
        let first = browser.window(APP);
        let second = browser.window(APP);
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = first.on_storage_change(recording_storage_handler(&log));
        let _b = second.on_storage_change(recording_storage_handler(&log));

        browser.storage().set_item("k", "v");
        assert_eq!(log.lock().len(), 2);

        browser.clear_storage();
        assert_eq!(log.lock().len(), 4);
        assert_eq!(log.lock()[3].key, None);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let browser = MemoryBrowser::new();
        let writer = browser.window(APP);
        let reader = browser.window(APP);
        let log = Arc::new(Mutex::new(Vec::new()));

        let subscription = reader.on_storage_change(recording_storage_handler(&log));
        assert_eq!(reader.storage_listener_count(), 1);
        drop(subscription);
        assert_eq!(reader.storage_listener_count(), 0);

        writer.storage().set_item("k", "v");
        assert!(log.lock().is_empty());
    }

    #[test]
    fn messages_reach_listeners() {
        let browser = MemoryBrowser::new();
        let window = browser.window(APP);
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _sub = window.on_message(Arc::new(move |event: &MessageEvent| {
            sink.lock().push((event.origin.clone(), event.data.clone()));
        }));

        window.post_message("https://api.aai.ebi.ac.uk", "token");
        assert_eq!(
            *log.lock(),
            vec![("https://api.aai.ebi.ac.uk".to_string(), "token".to_string())]
        );
    }

    #[test]
    fn open_records_popups() {
        let browser = MemoryBrowser::new();
        let window = browser.window(APP);

        let handle = window.open("https://idp/sso", "Sign in", "width=1").unwrap();
        handle.focus();
        handle.close();

        let opened = window.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].url(), "https://idp/sso");
        assert_eq!(opened[0].name(), "Sign in");
        assert_eq!(opened[0].features(), "width=1");
        assert!(opened[0].is_closed());
        assert_eq!(opened[0].focus_count(), 1);
    }

    #[test]
    fn blocked_popups_are_refused() {
        let browser = MemoryBrowser::new();
        let window = browser.window(APP);
        window.block_popups(true);

        assert!(window.open("https://idp/sso", "_blank", "").is_none());
        assert!(window.opened().is_empty());
    }

    #[test]
    fn screen_size_is_configurable() {
        let browser = MemoryBrowser::new();
        assert_eq!(browser.window(APP).screen_size(), DEFAULT_SCREEN);

        let small = browser.window_with_screen(APP, ScreenSize::new(320, 480));
        assert_eq!(small.screen_size(), ScreenSize::new(320, 480));
    }
}

//! Session coordinator.
//!
//! `SessionCoordinator` owns the current session of one window. Every
//! trigger (token login, credential login, cross-window message, storage
//! broadcast, refresh, logout, expiry) funnels into a single recompute that
//! derives the session from the persisted token:
//!
//! 1. cancel the pending expiry timer
//! 2. inspect the token (decode errors count as "no token")
//! 3. valid: publish the user, run login listeners, arm the expiry timer
//! 4. invalid: remove the token, publish `None`, run logout listeners

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;

use aap_auth::sso::{self, LoginOptions};
use aap_auth::{
    AapClient, AuthConfig, ClaimsDecoder, Credentials, IdentityApi, JwtClaimsDecoder, NewAccount,
    PasswordChange, StorageTokenStore, TokenService, TokenStore,
};
use aap_auth_core::{ExpiresAt, ListenerId, User};

use crate::error::{Result, SessionError};
use crate::events::{invoke_all, EventKind, EventRegistry};
use crate::host::{HostWindow, MessageEvent, StorageEvent, Subscription, WindowHandle};
use crate::scheduler::ExpiryScheduler;
use crate::state::{SessionState, UserStream};
use crate::sync::{is_marker_event, CommMarker};
use crate::window::{WindowGeometry, LOGIN_WINDOW_NAME};

/// Builder for [`SessionCoordinator`].
///
/// Only the configuration and the host are required. The token store
/// defaults to the host's shared storage under the configured key, the
/// decoder to [`JwtClaimsDecoder`] and the identity API to [`AapClient`].
pub struct SessionCoordinatorBuilder {
    config: AuthConfig,
    host: Arc<dyn HostWindow>,
    token_store: Option<Arc<dyn TokenStore>>,
    decoder: Option<Arc<dyn ClaimsDecoder>>,
    identity: Option<Arc<dyn IdentityApi>>,
}

impl SessionCoordinatorBuilder {
    /// Use a custom token store.
    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Use a custom claims decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Use a custom identity API client.
    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityApi>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attach to the host and derive the initial session.
    ///
    /// # Errors
    ///
    /// Returns an error if the default identity API client cannot be built.
    pub fn build(self) -> Result<SessionCoordinator> {
        let identity: Arc<dyn IdentityApi> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(AapClient::new(self.config.clone())?),
        };
        let store = self.token_store.unwrap_or_else(|| {
            Arc::new(StorageTokenStore::new(
                self.host.storage(),
                self.config.token_storage_key.clone(),
            ))
        });
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(JwtClaimsDecoder::new()));

        let inner = Arc::new(Inner {
            identity_origin: self.config.identity_origin(),
            config: self.config,
            marker: CommMarker::new(self.host.storage()),
            host: self.host,
            tokens: TokenService::new(store, decoder),
            identity,
            state: SessionState::new(),
            login_listeners: Mutex::new(EventRegistry::new(EventKind::Login)),
            logout_listeners: Mutex::new(EventRegistry::new(EventKind::Logout)),
            scheduler: ExpiryScheduler::new(),
            recompute_lock: ReentrantMutex::new(()),
            generation: AtomicU64::new(0),
            subscriptions: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
        });

        inner.attach();
        inner.recompute(true);

        tracing::debug!(
            identity_origin = %inner.identity_origin,
            origin = %inner.host.origin(),
            "Session coordinator attached"
        );
        Ok(SessionCoordinator { inner })
    }
}

/// Tracks the authenticated user of one window and keeps it in sync with
/// sibling windows.
///
/// Dropping the coordinator tears it down.
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: AuthConfig,
    identity_origin: String,
    host: Arc<dyn HostWindow>,
    tokens: TokenService,
    identity: Arc<dyn IdentityApi>,
    state: SessionState,
    marker: CommMarker,
    login_listeners: Mutex<EventRegistry>,
    logout_listeners: Mutex<EventRegistry>,
    scheduler: ExpiryScheduler,
    recompute_lock: ReentrantMutex<()>,
    generation: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
    torn_down: AtomicBool,
}

impl SessionCoordinator {
    /// Start building a coordinator for `host`.
    #[must_use]
    pub fn builder(config: AuthConfig, host: Arc<dyn HostWindow>) -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder {
            config,
            host,
            token_store: None,
            decoder: None,
            identity: None,
        }
    }

    /// Build a coordinator with all default collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity API client cannot be built.
    pub fn new(config: AuthConfig, host: Arc<dyn HostWindow>) -> Result<Self> {
        Self::builder(config, host).build()
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// The token adapter, for claim lookups.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    // =========================================================================
    // Session state
    // =========================================================================

    /// Stream of the current user: the latest value first, then every change.
    #[must_use]
    pub fn user(&self) -> UserStream {
        self.inner.state.stream()
    }

    /// Watch receiver positioned at the current user.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.inner.state.subscribe()
    }

    /// The current user.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.state.current()
    }

    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.is_authenticated()
    }

    /// Expiry of the current user's token.
    #[must_use]
    pub fn expires_at(&self) -> Option<ExpiresAt> {
        self.inner.state.expires_at()
    }

    /// Returns true while the automatic logout timer is pending.
    #[must_use]
    pub fn logout_pending(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    // =========================================================================
    // Login and logout
    // =========================================================================

    /// Accept a token received out of band and derive the session from it.
    ///
    /// Returns the resulting user, `None` if the token was rejected.
    pub fn log_in_with_token(&self, token: &str) -> Option<User> {
        self.inner.replace_token(token, true)
    }

    /// Log in with a username and password through the identity API.
    ///
    /// Returns the resulting user, `None` if the issued token was rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are refused or the identity API
    /// rejects the request. The session is left untouched.
    pub async fn log_in(
        &self,
        credentials: &Credentials,
        options: Option<&LoginOptions>,
    ) -> Result<Option<User>> {
        if let Some(options) = options {
            sso::check_login_options(options)?;
        }
        let token = self.inner.identity.login(credentials, options).await?;
        let user = self.inner.replace_token(&token, true);
        if let Some(user) = &user {
            tracing::info!(uid = %user.uid, "Logged in with credentials");
        }
        Ok(user)
    }

    /// End the session in this window and every sibling window.
    ///
    /// Safe to call when already logged out: storage is still cleared,
    /// `None` is still published and siblings are still notified.
    pub fn log_out(&self) {
        self.inner.log_out();
    }

    /// Exchange the current token for a fresh one without running login
    /// listeners.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoggedIn`] if there is no token,
    /// [`SessionError::SessionChanged`] if the token was replaced or removed
    /// while the request was in flight, or the identity API error. On error
    /// the session and timer are untouched.
    pub async fn refresh(&self) -> Result<Option<User>> {
        let current = self.inner.tokens.token().ok_or(SessionError::NotLoggedIn)?;
        let token = self.inner.identity.refresh(&current).await?;
        if self.inner.tokens.token().as_deref() != Some(current.as_str()) {
            tracing::debug!("Session changed during refresh, renewed token discarded");
            return Err(SessionError::SessionChanged);
        }
        let user = self.inner.replace_token(&token, false);
        tracing::debug!(renewed = user.is_some(), "Token refreshed");
        Ok(user)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Run `listener` whenever a token is accepted by a login-triggering
    /// recompute.
    pub fn add_login_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.login_listeners.lock().add(Arc::new(listener))
    }

    /// Remove a login listener. Returns false for unknown or removed ids.
    pub fn remove_login_listener(&self, id: ListenerId) -> bool {
        self.inner.login_listeners.lock().remove(id)
    }

    /// Run `listener` whenever a recompute ends logged out.
    pub fn add_logout_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.logout_listeners.lock().add(Arc::new(listener))
    }

    /// Remove a logout listener. Returns false for unknown or removed ids.
    pub fn remove_logout_listener(&self, id: ListenerId) -> bool {
        self.inner.logout_listeners.lock().remove(id)
    }

    // =========================================================================
    // Identity API pass-through
    // =========================================================================

    /// Create an account. Returns the new user's id.
    ///
    /// # Errors
    ///
    /// Returns the identity API error.
    pub async fn create_account(&self, account: &NewAccount) -> Result<String> {
        Ok(self.inner.identity.create_account(account).await?)
    }

    /// Change a password.
    ///
    /// # Errors
    ///
    /// Returns the identity API error.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        Ok(self.inner.identity.change_password(change).await?)
    }

    // =========================================================================
    // Single sign-on
    // =========================================================================

    /// URL of the SSO page for this window's origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are refused.
    pub fn sso_url(&self, options: Option<&LoginOptions>) -> Result<String> {
        Ok(sso::sso_url(
            &self.inner.config,
            &self.inner.host.origin(),
            options,
        )?)
    }

    /// Open the SSO page in a popup. The popup posts the token back and is
    /// closed once the token is accepted.
    ///
    /// Returns `None` if the host refused to open the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are refused.
    pub fn open_login_window(
        &self,
        options: Option<&LoginOptions>,
        geometry: WindowGeometry,
    ) -> Result<Option<Arc<dyn WindowHandle>>> {
        let url = self.sso_url(options)?;
        let features = geometry.features_on(self.inner.host.screen_size());
        Ok(self.inner.open_focused(&url, &features))
    }

    /// Open the SSO page in a new tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are refused.
    pub fn open_login_tab(
        &self,
        options: Option<&LoginOptions>,
    ) -> Result<Option<Arc<dyn WindowHandle>>> {
        let url = self.sso_url(options)?;
        Ok(self.inner.open_focused(&url, ""))
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Detach from the host and cancel the expiry timer. Idempotent.
    pub fn tear_down(&self) {
        self.inner.tear_down();
    }

    /// Returns true once the coordinator has been torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.inner.tear_down();
    }
}

impl Inner {
    fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let messages = self.host.on_message(Arc::new(move |event: &MessageEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_message(event);
            }
        }));

        let weak = Arc::downgrade(self);
        let storage = self
            .host
            .on_storage_change(Arc::new(move |event: &StorageEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_storage(event);
                }
            }));

        self.subscriptions.lock().extend([messages, storage]);
    }

    fn handle_message(self: &Arc<Self>, event: &MessageEvent) {
        if event.origin != self.identity_origin {
            return;
        }

        self.tokens.set_token(&event.data);
        if let Some(source) = &event.source {
            source.close();
        }
        if let Some(user) = self.recompute(true) {
            tracing::info!(uid = %user.uid, "Logged in from identity provider message");
        }
        self.marker.bump();
    }

    fn handle_storage(self: &Arc<Self>, event: &StorageEvent) {
        if is_marker_event(event) {
            tracing::debug!("Session changed in another window");
            self.recompute(true);
        }
    }

    /// Persist a freshly issued token, recompute and notify siblings.
    fn replace_token(self: &Arc<Self>, token: &str, invoke_login: bool) -> Option<User> {
        self.tokens.remove_token();
        self.tokens.set_token(token);
        let user = self.recompute(invoke_login);
        self.marker.bump();
        user
    }

    fn log_out(self: &Arc<Self>) {
        self.tokens.remove_token();
        self.recompute(true);
        self.marker.bump();
        tracing::info!("Logged out");
    }

    fn expire(self: &Arc<Self>) {
        tracing::info!("Token expired");
        self.log_out();
    }

    /// The single session transition.
    fn recompute(self: &Arc<Self>, invoke_login: bool) -> Option<User> {
        let _serial = self.recompute_lock.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.scheduler.cancel();

        let Some(valid) = self.tokens.inspect() else {
            self.tokens.remove_token();
            self.state.publish_logged_out();
            tracing::debug!("No valid token, session cleared");

            let listeners = self.logout_listeners.lock().snapshot();
            invoke_all(EventKind::Logout, &listeners);
            return None;
        };

        let user = valid.user();
        self.state.publish_user(user.clone(), valid.expires_at);
        tracing::debug!(
            uid = %user.uid,
            expires_at = valid.expires_at.as_unix_millis(),
            "Session published"
        );

        if invoke_login {
            let listeners = self.login_listeners.lock().snapshot();
            invoke_all(EventKind::Login, &listeners);
        }

        // A listener may have recomputed again; its timer stands
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Recompute superseded by a listener");
            return self.state.current();
        }
        if self.torn_down.load(Ordering::SeqCst) {
            return Some(user);
        }

        let delay = valid.expires_at.remaining_from(ExpiresAt::now());
        let weak: Weak<Self> = Arc::downgrade(self);
        self.scheduler.arm(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.expire();
            }
        });
        Some(user)
    }

    fn open_focused(&self, url: &str, features: &str) -> Option<Arc<dyn WindowHandle>> {
        let window = self.host.open(url, LOGIN_WINDOW_NAME, features);
        match &window {
            Some(window) => window.focus(),
            None => tracing::warn!("Host refused to open the login window"),
        }
        window
    }

    fn tear_down(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        drop(subscriptions);
        self.scheduler.cancel();
        tracing::debug!("Session coordinator torn down");
    }
}

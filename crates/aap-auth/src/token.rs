//! Token persistence and the fault-containing token adapter.
//!
//! The session layer reads and writes the bearer token through
//! [`TokenStore`], and asks [`TokenService`] whether it is usable. Every
//! decode failure is swallowed at this boundary: a malformed token looks
//! exactly like no token at all.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use aap_auth_core::{ExpiresAt, User};

use crate::jwt::{Claims, ClaimsDecoder};

/// Key/value storage shared by every window of the same origin
/// (`localStorage` in a browser).
pub trait SharedStorage: Send + Sync {
    /// Read a value.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str);

    /// Delete a value. Deleting a missing key is a no-op.
    fn remove_item(&self, key: &str);
}

/// The single persisted token slot.
pub trait TokenStore: Send + Sync {
    /// Read the current token.
    fn get(&self) -> Option<String>;

    /// Replace the current token.
    fn set(&self, token: &str);

    /// Clear the current token.
    fn remove(&self);
}

/// A [`TokenStore`] keeping the token under one key of a [`SharedStorage`].
pub struct StorageTokenStore {
    storage: Arc<dyn SharedStorage>,
    key: String,
}

impl StorageTokenStore {
    /// Create a store over `storage`, using `key` for the token.
    #[must_use]
    pub fn new(storage: Arc<dyn SharedStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// The storage key holding the token.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl TokenStore for StorageTokenStore {
    fn get(&self) -> Option<String> {
        self.storage.get_item(&self.key)
    }

    fn set(&self, token: &str) {
        self.storage.set_item(&self.key, token);
    }

    fn remove(&self) {
        self.storage.remove_item(&self.key);
    }
}

/// In-process [`SharedStorage`].
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl SharedStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.write().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.write().remove(key);
    }
}

/// In-process [`TokenStore`] for hosts without shared storage.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set(&self, token: &str) {
        *self.token.write() = Some(token.to_string());
    }

    fn remove(&self) {
        *self.token.write() = None;
    }
}

/// A token that decoded cleanly and had not expired when inspected.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// The raw bearer token.
    pub token: String,
    /// Its decoded claims.
    pub claims: Claims,
    /// When it expires.
    pub expires_at: ExpiresAt,
}

impl ValidatedToken {
    /// Build the user this token identifies.
    #[must_use]
    pub fn user(&self) -> User {
        let claim = |name: &str| self.claims.get::<String>(name).unwrap_or_default();
        User {
            uid: claim("sub"),
            name: claim("name"),
            nickname: claim("nickname"),
            email: claim("email"),
            token: self.token.clone(),
        }
    }
}

/// Adapter between the session layer and token storage/decoding.
///
/// Nothing here returns an error: decode failures become `false`, `None`
/// or the supplied default.
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    decoder: Arc<dyn ClaimsDecoder>,
}

impl TokenService {
    /// Create a token service.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        Self { store, decoder }
    }

    /// The current token. An empty string counts as no token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.store.get().filter(|token| !token.is_empty())
    }

    /// Replace the persisted token.
    pub fn set_token(&self, token: &str) {
        self.store.set(token);
    }

    /// Clear the persisted token.
    pub fn remove_token(&self) {
        self.store.remove();
    }

    /// Decode the current token's claims, if it decodes at all.
    #[must_use]
    pub fn claims(&self) -> Option<Claims> {
        self.decode(&self.token()?)
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        match self.decoder.decode(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "Stored token does not decode");
                None
            }
        }
    }

    /// Read, decode and check the current token against `now`.
    ///
    /// Returns `None` if there is no token, it does not decode, it has no
    /// `exp` claim, or it expired at or before `now`.
    #[must_use]
    pub fn inspect_at(&self, now: ExpiresAt) -> Option<ValidatedToken> {
        let token = self.token()?;
        let claims = self.decode(&token)?;
        let expires_at = claims.expires_at()?;
        if expires_at.is_expired_at(now) {
            return None;
        }

        Some(ValidatedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Read, decode and check the current token against the wall clock.
    #[must_use]
    pub fn inspect(&self) -> Option<ValidatedToken> {
        self.inspect_at(ExpiresAt::now())
    }

    /// Returns true if the current token decodes and has not expired.
    #[must_use]
    pub fn is_token_valid(&self) -> bool {
        self.inspect().is_some()
    }

    /// Expiration of the current token, expired or not.
    #[must_use]
    pub fn expiration(&self) -> Option<ExpiresAt> {
        self.claims()?.expires_at()
    }

    /// A claim of the current token, or `None` on any failure.
    #[must_use]
    pub fn claim<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.claims()?.get(name)
    }

    /// A claim of the current token, or `default` on any failure.
    #[must_use]
    pub fn claim_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.claim(name).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, Result};
    use crate::jwt::fixtures::{EXPIRED_TOKEN_1, VALID_TOKEN_1};
    use crate::jwt::{mint_test_token, JwtClaimsDecoder};

    struct FailingDecoder;

    impl ClaimsDecoder for FailingDecoder {
        fn decode(&self, _token: &str) -> Result<Claims> {
            Err(AuthError::InvalidToken("dodgy token".to_string()))
        }
    }

    fn service_with(token: Option<&str>) -> TokenService {
        let store = match token {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::new(),
        };
        TokenService::new(Arc::new(store), Arc::new(JwtClaimsDecoder::new()))
    }

    #[test]
    fn saves_and_replaces_tokens() {
        let service = service_with(None);
        service.set_token("one");
        assert_eq!(service.token().as_deref(), Some("one"));
        service.set_token("another");
        assert_eq!(service.token().as_deref(), Some("another"));
        service.remove_token();
        assert_eq!(service.token(), None);
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let service = service_with(Some(""));
        assert_eq!(service.token(), None);
        assert!(!service.is_token_valid());
    }

    #[test]
    fn valid_fixture_builds_user() {
        let service = service_with(Some(VALID_TOKEN_1));
        let validated = service.inspect().unwrap();
        let user = validated.user();

        assert_eq!(
            user,
            User {
                uid: "usr-1".to_string(),
                name: "Ed Munden Gras".to_string(),
                nickname: "1".to_string(),
                email: "test@ebi.ac.uk".to_string(),
                token: VALID_TOKEN_1.to_string(),
            }
        );
        assert!(service.is_token_valid());
    }

    #[test]
    fn expired_fixture_is_invalid_but_has_expiration() {
        let service = service_with(Some(EXPIRED_TOKEN_1));
        assert!(!service.is_token_valid());
        assert!(service.inspect().is_none());
        assert_eq!(
            service.expiration(),
            Some(ExpiresAt::from_unix_millis(1_518_083_433_000))
        );
    }

    #[test]
    fn inspect_at_uses_given_clock() {
        let service = service_with(Some(EXPIRED_TOKEN_1));
        let before = ExpiresAt::from_unix_millis(1_518_083_432_999);
        assert!(service.inspect_at(before).is_some());

        let at = ExpiresAt::from_unix_millis(1_518_083_433_000);
        assert!(service.inspect_at(at).is_none());
    }

    #[test]
    fn token_without_exp_is_invalid() {
        let token = mint_test_token(&serde_json::json!({ "sub": "usr-3" }));
        let service = service_with(Some(token.as_str()));
        assert!(!service.is_token_valid());
        assert_eq!(service.claim::<String>("sub").as_deref(), Some("usr-3"));
    }

    #[test]
    fn missing_claims_leave_fields_empty() {
        let token = mint_test_token(&serde_json::json!({
            "sub": "usr-4",
            "exp": 4_000_000_000_u64,
        }));
        let user = service_with(Some(token.as_str())).inspect().unwrap().user();
        assert_eq!(user.uid, "usr-4");
        assert_eq!(user.name, "");
        assert_eq!(user.email, "");
    }

    #[test]
    fn decode_failures_are_contained() {
        let service = TokenService::new(
            Arc::new(MemoryTokenStore::with_token("dodgyToken")),
            Arc::new(FailingDecoder),
        );

        assert!(!service.is_token_valid());
        assert_eq!(service.expiration(), None);
        assert_eq!(service.claim::<String>("name"), None);
        assert_eq!(service.claim_or("name", String::new()), "");
        assert_eq!(service.claim_or("iat", 7_u64), 7);
    }

    #[test]
    fn claim_or_returns_value_when_present() {
        let service = service_with(Some(VALID_TOKEN_1));
        assert_eq!(service.claim_or("email", String::new()), "test@ebi.ac.uk");
        assert_eq!(service.claim_or("iat", 0_u64), 1);
    }

    #[test]
    fn storage_token_store_uses_its_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = StorageTokenStore::new(storage.clone(), "jwt_token");

        store.set("abc");
        assert_eq!(storage.get_item("jwt_token").as_deref(), Some("abc"));
        assert_eq!(store.get().as_deref(), Some("abc"));
        assert_eq!(store.key(), "jwt_token");

        store.remove();
        assert!(storage.is_empty());
    }
}

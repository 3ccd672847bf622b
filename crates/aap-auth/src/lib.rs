//! Token handling and identity API access for aap-auth.
//!
//! This crate provides everything below the session layer:
//!
//! - Bearer token claims decoding (`ClaimsDecoder`, `JwtClaimsDecoder`)
//! - Token persistence seams (`TokenStore`, `SharedStorage`)
//! - A fault-containing token adapter (`TokenService`)
//! - SSO URL construction with login option filtering
//! - An HTTP client for the AAP identity API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │ SessionCoordinator│────▶│   TokenService   │
//! │ (aap-auth-session)│     │   (adapter)      │
//! └────────┬─────────┘     └──┬────────────┬──┘
//!          │                  │            │
//!          │          ┌───────▼──────┐ ┌───▼──────────┐
//!          │          │  TokenStore  │ │ ClaimsDecoder│
//!          │          │  (trait)     │ │ (trait)      │
//!          │          └──────────────┘ └──────────────┘
//!          │ HTTPS
//! ┌────────▼─────────┐
//! │   IdentityApi    │──────▶ AAP /auth, /token
//! │   (AapClient)    │
//! └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use aap_auth::{AuthConfig, LoginOptions};
//!
//! let config = AuthConfig::new("https://api.aai.ebi.ac.uk/");
//! assert_eq!(config.token_url(), "https://api.aai.ebi.ac.uk/token");
//!
//! let options = LoginOptions::new().with("ttl", "30");
//! let url = aap_auth::sso::sso_url(&config, "http://localhost:4200", Some(&options)).unwrap();
//! assert_eq!(
//!     url,
//!     "https://api.aai.ebi.ac.uk/sso?from=http%3A%2F%2Flocalhost%3A4200&ttl=30"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod jwt;
pub mod sso;
pub mod token;

use serde::Deserialize;

pub use client::{AapClient, Credentials, IdentityApi, NewAccount, PasswordChange};
pub use error::{AuthError, Result};
pub use jwt::{Claims, ClaimsDecoder, JwtClaimsDecoder};
pub use sso::LoginOptions;
pub use token::{
    MemoryStorage, MemoryTokenStore, SharedStorage, StorageTokenStore, TokenService, TokenStore,
    ValidatedToken,
};

pub use aap_auth_core::{ExpiresAt, ListenerId, User};

/// Configuration for talking to the AAP identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the identity API (e.g., `https://api.aai.ebi.ac.uk`).
    ///
    /// A trailing slash is ignored.
    #[serde(default = "AuthConfig::default_identity_url")]
    pub identity_url: String,

    /// Storage key holding the bearer token.
    #[serde(default = "AuthConfig::default_token_storage_key")]
    pub token_storage_key: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "AuthConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl AuthConfig {
    fn default_identity_url() -> String {
        "https://api.aai.ebi.ac.uk".to_string()
    }

    fn default_token_storage_key() -> String {
        "id_token".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Create a configuration for the given identity URL with default settings.
    #[must_use]
    pub fn new(identity_url: impl Into<String>) -> Self {
        Self {
            identity_url: identity_url.into(),
            ..Self::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads `AAP_URL`, `AAP_TOKEN_KEY` and `AAP_REQUEST_TIMEOUT_SECONDS`,
    /// falling back to the defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let identity_url =
            std::env::var("AAP_URL").unwrap_or_else(|_| Self::default_identity_url());

        let token_storage_key =
            std::env::var("AAP_TOKEN_KEY").unwrap_or_else(|_| Self::default_token_storage_key());

        let request_timeout_seconds = std::env::var("AAP_REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(Self::default_request_timeout);

        Self {
            identity_url,
            token_storage_key,
            request_timeout_seconds,
        }
    }

    /// Set the token storage key.
    #[must_use]
    pub fn token_storage_key(mut self, key: impl Into<String>) -> Self {
        self.token_storage_key = key.into();
        self
    }

    /// The identity URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.identity_url.trim_end_matches('/')
    }

    /// Get the account/login endpoint URL.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.base_url())
    }

    /// Get the token refresh endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url())
    }

    /// Get the single sign-on page URL, without query parameters.
    #[must_use]
    pub fn sso_base_url(&self) -> String {
        format!("{}/sso", self.base_url())
    }

    /// The origin (`scheme://host[:port]`) that login messages must come from.
    ///
    /// Falls back to the trimmed identity URL if it cannot be parsed.
    #[must_use]
    pub fn identity_origin(&self) -> String {
        reqwest::Url::parse(self.base_url()).map_or_else(
            |_| self.base_url().to_string(),
            |url| url.origin().ascii_serialization(),
        )
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_url: Self::default_identity_url(),
            token_storage_key: Self::default_token_storage_key(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.identity_url, "https://api.aai.ebi.ac.uk");
        assert_eq!(config.token_storage_key, "id_token");
        assert_eq!(config.request_timeout_seconds, 30);
    }

    #[test]
    fn config_urls() {
        let config = AuthConfig::new("https://blah.com/");
        assert_eq!(config.base_url(), "https://blah.com");
        assert_eq!(config.auth_url(), "https://blah.com/auth");
        assert_eq!(config.token_url(), "https://blah.com/token");
        assert_eq!(config.sso_base_url(), "https://blah.com/sso");
    }

    #[test]
    fn identity_origin_strips_path() {
        let config = AuthConfig::new("https://example.org:8443/aap/");
        assert_eq!(config.identity_origin(), "https://example.org:8443");

        let config = AuthConfig::new("https://api.aai.ebi.ac.uk");
        assert_eq!(config.identity_origin(), "https://api.aai.ebi.ac.uk");
    }

    #[test]
    fn identity_origin_falls_back_on_garbage() {
        let config = AuthConfig::new("not a url/");
        assert_eq!(config.identity_origin(), "not a url");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"identity_url": "https://blah.com"}"#).unwrap();
        assert_eq!(config.identity_url, "https://blah.com");
        assert_eq!(config.token_storage_key, "id_token");
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(30));
    }

    #[test]
    fn token_storage_key_builder() {
        let config = AuthConfig::default().token_storage_key("jwt_token");
        assert_eq!(config.token_storage_key, "jwt_token");
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::Unauthorized.status(), Some(401));
        assert_eq!(AuthError::Forbidden.status(), Some(403));
        assert_eq!(
            AuthError::Http {
                status: 500,
                body: String::new()
            }
            .status(),
            Some(500)
        );
        assert_eq!(AuthError::InvalidConfig(String::new()).status(), None);
    }

    #[test]
    fn auth_error_client_side() {
        assert!(AuthError::TtlTooLong {
            requested: "1441".to_string(),
            limit: 1440
        }
        .is_client_error());
        assert!(AuthError::InvalidOption {
            key: "ttl".to_string(),
            value: "soon".to_string()
        }
        .is_client_error());
        assert!(!AuthError::Unauthorized.is_client_error());
    }
}

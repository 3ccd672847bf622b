//! AAP identity API client.
//!
//! Plain request/response wrappers around the identity provider's `/auth`
//! and `/token` endpoints. Nothing is retried; every failure is handed back
//! to the caller.

use std::fmt;

use async_trait::async_trait;
use base64::prelude::*;
use serde::Serialize;

use crate::error::{AuthError, Result};
use crate::sso::{format_query, LoginOptions};
use crate::AuthConfig;

/// Request payload for creating an account.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    /// Full name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl NewAccount {
    /// Create a request with only the mandatory fields.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: None,
            username: username.into(),
            password: password.into(),
            email: None,
            organization: None,
        }
    }
}

/// Username/password pair for Basic authentication.
#[derive(Clone)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The `Authorization` header value for these credentials.
    #[must_use]
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64_STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A password change request.
#[derive(Clone)]
pub struct PasswordChange {
    /// Login name.
    pub username: String,
    /// Current password, used to authenticate the request.
    pub old_password: String,
    /// Replacement password.
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Body of the password change request.
#[derive(Serialize)]
struct PasswordPatch<'a> {
    username: &'a str,
    password: &'a str,
}

/// Trait for the identity provider operations the session layer uses.
///
/// This trait abstracts the HTTP client, allowing for mock implementations
/// in tests.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Create an account and return the new user's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    async fn create_account(&self, account: &NewAccount) -> Result<String>;

    /// Exchange credentials for a bearer token.
    ///
    /// Implementations apply [`filter_login_options`](crate::sso::filter_login_options)
    /// to `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are refused locally, or the request
    /// fails or is rejected.
    async fn login(
        &self,
        credentials: &Credentials,
        options: Option<&LoginOptions>,
    ) -> Result<String>;

    /// Change a password.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    async fn change_password(&self, change: &PasswordChange) -> Result<()>;

    /// Exchange a current token for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    async fn refresh(&self, token: &str) -> Result<String>;
}

/// HTTP client for the AAP identity API.
#[derive(Debug, Clone)]
pub struct AapClient {
    config: AuthConfig,
    client: reqwest::Client,
}

impl AapClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub const fn with_client(config: AuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Read a text body from a successful response, or map the failure.
    async fn handle_text(response: reqwest::Response) -> Result<String> {
        let status = response.status();

        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| AuthError::Request(format!("invalid response: {e}")));
        }

        match status.as_u16() {
            401 => Err(AuthError::Unauthorized),
            403 => Err(AuthError::Forbidden),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::Http { status: code, body })
            }
        }
    }
}

#[async_trait]
impl IdentityApi for AapClient {
    async fn create_account(&self, account: &NewAccount) -> Result<String> {
        let response = self
            .client
            .post(self.config.auth_url())
            .json(account)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Self::handle_text(response).await
    }

    async fn login(
        &self,
        credentials: &Credentials,
        options: Option<&LoginOptions>,
    ) -> Result<String> {
        let url = format!("{}{}", self.config.auth_url(), format_query(options)?);
        tracing::debug!(username = %credentials.username, "Logging in with credentials");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, credentials.basic_header())
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Self::handle_text(response).await
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        let current = Credentials::new(change.username.as_str(), change.old_password.as_str());
        let body = PasswordPatch {
            username: &change.username,
            password: &change.new_password,
        };

        let response = self
            .client
            .patch(self.config.auth_url())
            .header(reqwest::header::AUTHORIZATION, current.basic_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        // The body is empty on success
        Self::handle_text(response).await.map(|_| ())
    }

    async fn refresh(&self, token: &str) -> Result<String> {
        let response = self
            .client
            .get(self.config.token_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Self::handle_text(response).await
    }
}

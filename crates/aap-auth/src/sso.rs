//! Single sign-on URL construction and login option filtering.
//!
//! Login options are passed to the identity provider as URL parameters. The
//! `ttl` option (token lifetime in minutes) is policed here: a long-lived
//! token that leaks is as good as a password, so anything above
//! [`TTL_HARD_LIMIT_MINUTES`] is refused and anything above
//! [`TTL_SOFT_LIMIT_MINUTES`] is logged.

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Token lifetimes above this many minutes produce a warning.
pub const TTL_SOFT_LIMIT_MINUTES: u32 = 60;

/// Token lifetimes above this many minutes are refused.
pub const TTL_HARD_LIMIT_MINUTES: u32 = 60 * 24;

/// Ordered login options sent as URL parameters.
///
/// Setting a key twice keeps its original position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions(Vec<(String, String)>);

impl LoginOptions {
    /// Create an empty option set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add or replace an option, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Add or replace an option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    /// Get an option value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LoginOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.set(key, value);
        }
        options
    }
}

/// Check login options for values the identity provider must not receive.
///
/// Returns the requested `ttl` in minutes, if one is set. Fractional minutes
/// are accepted. Nothing is logged; see [`filter_login_options`].
///
/// # Errors
///
/// Returns [`AuthError::TtlTooLong`] if `ttl` exceeds
/// [`TTL_HARD_LIMIT_MINUTES`], or [`AuthError::InvalidOption`] if `ttl` is
/// not a finite, non-negative number of minutes.
pub fn check_login_options(options: &LoginOptions) -> Result<Option<f64>> {
    let Some(ttl) = options.get("ttl") else {
        return Ok(None);
    };

    let minutes = ttl
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite() && *m >= 0.0)
        .ok_or_else(|| AuthError::InvalidOption {
            key: "ttl".to_string(),
            value: ttl.to_string(),
        })?;

    if minutes > f64::from(TTL_HARD_LIMIT_MINUTES) {
        return Err(AuthError::TtlTooLong {
            requested: ttl.to_string(),
            limit: TTL_HARD_LIMIT_MINUTES,
        });
    }
    Ok(Some(minutes))
}

/// [`check_login_options`], warning about a `ttl` above
/// [`TTL_SOFT_LIMIT_MINUTES`].
///
/// # Errors
///
/// Returns the errors of [`check_login_options`].
pub fn filter_login_options(options: &LoginOptions) -> Result<()> {
    if let Some(minutes) = check_login_options(options)? {
        if minutes > f64::from(TTL_SOFT_LIMIT_MINUTES) {
            tracing::warn!(
                ttl = minutes,
                limit = TTL_SOFT_LIMIT_MINUTES,
                "Login requested with a long token expiration"
            );
        }
    }
    Ok(())
}

/// Format options as a URL query string (`?a=1&b=2`), empty if there are none.
///
/// # Errors
///
/// Returns an error if the options fail [`filter_login_options`].
pub fn format_query(options: Option<&LoginOptions>) -> Result<String> {
    let Some(options) = options.filter(|o| !o.is_empty()) else {
        return Ok(String::new());
    };
    filter_login_options(options)?;

    let pairs: Vec<String> = options
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    Ok(format!("?{}", pairs.join("&")))
}

/// Build the SSO page URL for an application served from `origin`.
///
/// The result is `{identity}/sso?from={origin}` followed by the options.
/// A `from` option overrides the origin.
///
/// # Errors
///
/// Returns an error if the options fail [`filter_login_options`].
pub fn sso_url(
    config: &AuthConfig,
    origin: &str,
    options: Option<&LoginOptions>,
) -> Result<String> {
    let mut all = LoginOptions::new().with("from", origin);
    if let Some(options) = options {
        for (key, value) in options.iter() {
            all.set(key, value);
        }
    }
    let query = format_query(Some(&all))?;
    Ok(format!("{}{}", config.sso_base_url(), query))
}

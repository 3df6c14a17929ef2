//! Bearer credentials

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Access token, optional refresh token and optional expiry.
///
/// Tokens are opaque and held as [`SecretString`] so they never show up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct Credential {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Credential with an access token only. Expiry is unknown.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into().into_boxed_str()),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::new(refresh_token.into().into_boxed_str()));
        self
    }

    /// Set the instant after which the access token is no longer presented.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Get the access token.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Get the refresh token, if any.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// Get the expiry, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token is past its expiry at `now`. Unknown expiry never
    /// expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the token is past its expiry now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `Bearer <access token>`.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }

    pub(crate) fn set_refresh_token(&mut self, refresh_token: SecretString) {
        self.refresh_token = Some(refresh_token);
    }
}

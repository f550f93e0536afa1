use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Per-backend settings supplied by the configuration loader.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Discovery base URL. Empty means the backend default.
    #[serde(default)]
    pub provider_url: String,
    /// Where the provider sends users back to after login.
    #[serde(default)]
    pub redirect_url: Option<Url>,
    /// Requested scopes. Empty means the backend default.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Per-request timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("provider_url", &self.provider_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a config with credentials only.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    /// Set the discovery base URL.
    pub fn with_provider_url(mut self, provider_url: impl Into<String>) -> Self {
        self.provider_url = provider_url.into();
        self
    }

    /// Set the redirect URL.
    pub fn with_redirect_url(mut self, redirect_url: Url) -> Self {
        self.redirect_url = Some(redirect_url);
        self
    }

    /// Set the requested scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The configured per-request timeout. A zero timeout is rejected.
    pub fn timeout(&self) -> Result<Option<Duration>, AuthError> {
        match self.timeout_ms {
            Some(0) => Err(AuthError::InvalidConfig(
                "timeout must be greater than zero".into(),
            )),
            Some(ms) => Ok(Some(Duration::from_millis(ms))),
            None => Ok(None),
        }
    }

    /// Fill an empty provider URL and an empty scope list from `defaults`.
    pub fn resolve(mut self, defaults: &ProviderDefaults) -> Self {
        if self.provider_url.trim().is_empty() {
            self.provider_url = defaults.provider_url.to_string();
        }
        if self.scopes.is_empty() {
            self.scopes = defaults.scopes.iter().map(|s| s.to_string()).collect();
        }
        self
    }
}

/// Compiled-in defaults of one backend kind.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDefaults {
    /// Well-known discovery base URL.
    pub provider_url: &'static str,
    /// Scopes requested when the caller configured none.
    pub scopes: &'static [&'static str],
}

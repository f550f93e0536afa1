use gatehouse_core::{AuthError, IdentityProvider, ProviderConfig};
use gatehouse_oidc::OidcIdentityProvider;
use gatehouse_providers_gitlab::GitLabProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The backend kinds the registry knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// gitlab.com or a self-hosted GitLab.
    Gitlab,
    /// Any OpenID Connect provider.
    Oidc,
}

impl ProviderKind {
    /// The id adapters of this kind report.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gitlab => "gitlab",
            ProviderKind::Oidc => "oidc",
        }
    }

    /// Build the adapter for this kind. Runs discovery.
    pub async fn connect(
        &self,
        config: ProviderConfig,
    ) -> Result<Arc<dyn IdentityProvider>, AuthError> {
        let provider: Arc<dyn IdentityProvider> = match self {
            ProviderKind::Gitlab => Arc::new(GitLabProvider::new(config).await?),
            ProviderKind::Oidc => Arc::new(OidcIdentityProvider::new(config).await?),
        };
        Ok(provider)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(ProviderKind::Gitlab),
            "oidc" => Ok(ProviderKind::Oidc),
            other => Err(AuthError::UnknownProvider(other.to_string())),
        }
    }
}

/// One configured backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Which adapter to build.
    pub provider: ProviderKind,
    /// Registry key; defaults to the kind's id.
    #[serde(default)]
    pub id: Option<String>,
    /// Credentials, URLs and scopes.
    #[serde(flatten)]
    pub config: ProviderConfig,
}

impl ProviderSettings {
    /// Settings for `provider` with the given config.
    pub fn new(provider: ProviderKind, config: ProviderConfig) -> Self {
        Self {
            provider,
            id: None,
            config,
        }
    }

    /// Register the adapter under a custom key.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The registry key.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(self.provider.as_str())
    }
}

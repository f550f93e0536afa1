//! Adapter for any standards-compliant OpenID Connect provider.
//!
//! There is no portable group API, so [`OidcIdentityProvider::resolve_groups`]
//! yields no groups. Revocation uses the RFC 7009 endpoint from discovery.

use async_trait::async_trait;
use gatehouse_core::{
    AuthError, HttpClient, IdentityProvider, OAuthToken, OidcProvider, ProviderConfig,
    ProviderDefaults, SessionState,
};
use reqwest::Method;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];

/// Generic OIDC has no well-known issuer; the provider URL must be configured.
pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    provider_url: "",
    scopes: DEFAULT_SCOPES,
};

const PROVIDER_ID: &str = "oidc";

/// Generic OpenID Connect backend adapter.
pub struct OidcIdentityProvider {
    core: OidcProvider,
}

impl OidcIdentityProvider {
    /// Run discovery against the configured provider URL.
    pub async fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        ensure_provider_url(&config)?;
        Ok(Self {
            core: OidcProvider::discover(config, &DEFAULTS).await?,
        })
    }

    /// Same as [`OidcIdentityProvider::new`] with a caller supplied transport.
    pub async fn with_client(config: ProviderConfig, http: HttpClient) -> Result<Self, AuthError> {
        ensure_provider_url(&config)?;
        Ok(Self {
            core: OidcProvider::discover_with_client(config, &DEFAULTS, http).await?,
        })
    }
}

fn ensure_provider_url(config: &ProviderConfig) -> Result<(), AuthError> {
    if config.provider_url.trim().is_empty() {
        return Err(AuthError::InvalidConfig(
            "identity/oidc: provider_url is required".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for OidcIdentityProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn core(&self) -> &OidcProvider {
        &self.core
    }

    async fn resolve_groups(&self, session: &SessionState) -> Result<Vec<String>, AuthError> {
        session
            .bearer_token()
            .ok_or(AuthError::EmptySession("identity/oidc"))?;
        Ok(Vec::new())
    }

    async fn revoke(&self, token: &OAuthToken) -> Result<(), AuthError> {
        let endpoint = self
            .core
            .metadata()
            .revocation_endpoint
            .as_deref()
            .ok_or(AuthError::RevokeNotSupported)?;

        let form = [
            ("token", token.access_token.as_str()),
            ("token_type_hint", "access_token"),
        ];
        match self
            .core
            .http()
            .send(Method::POST, endpoint, &[], Some(&form))
            .await
        {
            Ok(_) => Ok(()),
            Err(AuthError::TokenRevoked) => {
                log::debug!("identity/oidc: token was already revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

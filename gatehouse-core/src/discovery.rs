use crate::error::AuthError;
use crate::http::HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Path of the OpenID Connect discovery document relative to the issuer.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Endpoints advertised by an OpenID Connect provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier.
    pub issuer: String,
    /// Where users are sent to log in.
    pub authorization_endpoint: String,
    /// Where authorization codes are exchanged.
    pub token_endpoint: String,
    /// Userinfo endpoint, if published.
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    /// Signing keys for ID tokens.
    pub jwks_uri: String,
    /// RFC 7009 revocation endpoint, if published.
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    /// Scopes the provider advertises.
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    /// The full document, kept so adapters can decode their own claims.
    #[serde(skip)]
    raw: serde_json::Value,
}

impl ProviderMetadata {
    /// Fetch and parse the discovery document published under `issuer_url`.
    ///
    /// The advertised issuer must match `issuer_url`, ignoring a trailing slash.
    pub async fn discover(issuer_url: &str, client: &HttpClient) -> Result<Self, AuthError> {
        let issuer_url = issuer_url.trim_end_matches('/');
        if issuer_url.is_empty() {
            return Err(AuthError::InvalidConfig("provider URL is empty".into()));
        }
        let discovery_url = format!("{issuer_url}{WELL_KNOWN_PATH}");

        let raw: serde_json::Value = client
            .get_json(&discovery_url, &[("Accept", "application/json")])
            .await
            .map_err(|e| AuthError::Discovery {
                url: discovery_url.clone(),
                source: Box::new(e),
            })?;

        Self::from_document(issuer_url, raw)
    }

    /// Parse an already fetched discovery document.
    pub fn from_document(issuer_url: &str, raw: serde_json::Value) -> Result<Self, AuthError> {
        let mut metadata: ProviderMetadata =
            serde_json::from_value(raw.clone()).map_err(AuthError::MalformedDiscovery)?;

        if metadata.issuer.trim_end_matches('/') != issuer_url.trim_end_matches('/') {
            return Err(AuthError::IssuerMismatch {
                expected: issuer_url.to_string(),
                found: metadata.issuer,
            });
        }

        metadata.raw = raw;
        Ok(metadata)
    }

    /// Decode the discovery document into a caller supplied shape.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        Ok(serde_json::from_value(self.raw.clone())?)
    }
}

use crate::verifier::IdTokenClaims;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An OAuth2 token pair as issued by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// The bearer credential presented to the provider's APIs.
    pub access_token: String,
    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Present when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// Create a bearer token with only an access token set.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Attach an expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the token is past its expiry. Tokens without one never expire here.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// The value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Per-user session data produced by the login flow.
///
/// Adapters only read it; writing resolved groups back is up to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Id of the provider the user logged in with.
    pub provider_id: String,
    /// Subject claim of the ID token.
    pub subject: String,
    /// Email claim, if any.
    #[serde(default)]
    pub email: Option<String>,
    /// The token pair; `None` until the code exchange completed.
    #[serde(default)]
    pub access_token: Option<OAuthToken>,
    /// Remaining identity claims.
    #[serde(default)]
    pub claims: HashMap<String, serde_json::Value>,
    /// Group identifiers resolved from the provider.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl SessionState {
    /// Create a session for a subject.
    pub fn new(provider_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Session for the subject of a verified ID token.
    pub fn from_claims(
        provider_id: impl Into<String>,
        claims: IdTokenClaims,
        token: OAuthToken,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            subject: claims.sub,
            email: claims.email,
            access_token: Some(token),
            claims: claims.extra,
            groups: Vec::new(),
        }
    }

    /// Attach the token pair.
    pub fn with_token(mut self, token: OAuthToken) -> Self {
        self.access_token = Some(token);
        self
    }

    /// The access token, provided one is present and non-empty.
    pub fn bearer_token(&self) -> Option<&OAuthToken> {
        self.access_token
            .as_ref()
            .filter(|t| !t.access_token.is_empty())
    }
}

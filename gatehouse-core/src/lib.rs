//! # Gatehouse Core
//!
//! `gatehouse-core` holds what every identity-provider adapter shares: the
//! provider configuration, OIDC discovery, the HTTP transport, token and
//! session types, and the [`IdentityProvider`] capability trait that the
//! authorization layer dispatches through.

#![warn(missing_docs)]

use async_trait::async_trait;
use std::sync::Arc;

/// Errors that can occur while talking to an identity provider.
pub mod error;
pub use error::AuthError;

/// Tokens and per-user session data.
pub mod state;
pub use state::{OAuthToken, SessionState};

/// Provider configuration and backend defaults.
pub mod config;
pub use config::{ProviderConfig, ProviderDefaults};

/// OpenID Connect discovery.
pub mod discovery;
pub use discovery::ProviderMetadata;

/// HTTP transport shared by all adapters.
pub mod http;
pub use http::HttpClient;

/// ID token verification.
pub mod verifier;
pub use verifier::{IdTokenClaims, IdTokenVerifier};

/// The provider core embedded by every adapter.
pub mod provider;
pub use provider::{OAuth2Config, OidcProvider};

/// The uniform capability set of a backend adapter.
///
/// Adapters are read-only after construction, so one instance can serve
/// concurrent calls without locking.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identifier of the backend kind, e.g. `gitlab`.
    fn provider_id(&self) -> &str;

    /// The shared provider core.
    fn core(&self) -> &OidcProvider;

    /// Fetch the identifiers of the groups the session's user belongs to.
    ///
    /// Fails with [`AuthError::EmptySession`] without any network call when
    /// the session carries no access token.
    async fn resolve_groups(&self, session: &SessionState) -> Result<Vec<String>, AuthError>;

    /// Revoke an access token. A token that is already revoked is not an error.
    async fn revoke(&self, token: &OAuthToken) -> Result<(), AuthError>;

    /// Verify the ID token returned with `token` and open a session for its subject.
    ///
    /// Groups are left empty; resolve them with [`IdentityProvider::resolve_groups`].
    async fn session_from_id_token(
        &self,
        id_token: &str,
        token: OAuthToken,
    ) -> Result<SessionState, AuthError> {
        let claims: IdTokenClaims = self.core().verifier().verify(id_token).await?;
        Ok(SessionState::from_claims(self.provider_id(), claims, token))
    }
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn core(&self) -> &OidcProvider {
        (**self).core()
    }

    async fn resolve_groups(&self, session: &SessionState) -> Result<Vec<String>, AuthError> {
        (**self).resolve_groups(session).await
    }

    async fn revoke(&self, token: &OAuthToken) -> Result<(), AuthError> {
        (**self).revoke(token).await
    }

    async fn session_from_id_token(
        &self,
        id_token: &str,
        token: OAuthToken,
    ) -> Result<SessionState, AuthError> {
        (**self).session_from_id_token(id_token, token).await
    }
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Box<T> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn core(&self) -> &OidcProvider {
        (**self).core()
    }

    async fn resolve_groups(&self, session: &SessionState) -> Result<Vec<String>, AuthError> {
        (**self).resolve_groups(session).await
    }

    async fn revoke(&self, token: &OAuthToken) -> Result<(), AuthError> {
        (**self).revoke(token).await
    }

    async fn session_from_id_token(
        &self,
        id_token: &str,
        token: OAuthToken,
    ) -> Result<SessionState, AuthError> {
        (**self).session_from_id_token(id_token, token).await
    }
}

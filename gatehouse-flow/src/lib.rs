//! # Gatehouse Flow
//!
//! `gatehouse-flow` is the provider registry: it builds one adapter per
//! configured backend at startup and dispatches group resolution and token
//! revocation through [`IdentityProvider`] without knowing concrete types.
//!
//! ## Key Components
//!
//! - **[`IdentityRegistry`]**: the built, read-only set of adapters.
//! - **[`IdentityRegistryBuilder`]**: registers already constructed adapters.
//! - **[`ProviderSettings`]**: deserializable description of one backend.

#![warn(missing_docs)]

pub use gatehouse_core::IdentityProvider;
use gatehouse_core::{AuthError, OAuthToken, SessionState};
use std::collections::HashMap;
use std::sync::Arc;

/// Backend settings and kinds.
pub mod settings;

pub use settings::{ProviderKind, ProviderSettings};

/// The set of adapters available for login traffic.
#[derive(Clone, Default)]
pub struct IdentityRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl IdentityRegistry {
    /// Create a new [`IdentityRegistryBuilder`].
    pub fn builder() -> IdentityRegistryBuilder {
        IdentityRegistryBuilder::default()
    }

    /// Build every configured backend.
    ///
    /// Construction stops at the first backend whose discovery fails, so a
    /// broken backend never serves logins. Two entries resolving to the same
    /// key are rejected before any discovery runs for the second one.
    pub async fn from_settings<I>(settings: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = ProviderSettings>,
    {
        let mut builder = Self::builder();
        for entry in settings {
            let key = entry.key().to_string();
            if builder.providers.contains_key(&key) {
                return Err(AuthError::InvalidConfig(format!(
                    "identity provider {key} is configured more than once; set a distinct id"
                )));
            }
            let provider = entry.provider.connect(entry.config).await?;
            log::info!("registered identity provider {key} ({})", entry.provider);
            builder = builder.provider_as(key, provider);
        }
        Ok(builder.build())
    }

    /// Look up an adapter.
    pub fn get(&self, id: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(id).cloned()
    }

    /// Registered keys, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn provider(&self, id: &str) -> Result<&Arc<dyn IdentityProvider>, AuthError> {
        self.providers
            .get(id)
            .ok_or_else(|| AuthError::UnknownProvider(id.to_string()))
    }

    /// Resolve the session's groups with the adapter registered under `id`.
    pub async fn resolve_groups(
        &self,
        id: &str,
        session: &SessionState,
    ) -> Result<Vec<String>, AuthError> {
        self.provider(id)?.resolve_groups(session).await
    }

    /// Re-resolve groups for the session's own provider and store them in it.
    ///
    /// The session is left untouched on error.
    pub async fn refresh_groups(&self, session: &mut SessionState) -> Result<(), AuthError> {
        let groups = self.resolve_groups(&session.provider_id, session).await?;
        session.groups = groups;
        Ok(())
    }

    /// Revoke a token with the adapter registered under `id`.
    pub async fn revoke(&self, id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        self.provider(id)?.revoke(token).await
    }
}

/// A builder for configuring and creating an [`IdentityRegistry`].
#[derive(Default)]
pub struct IdentityRegistryBuilder {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl IdentityRegistryBuilder {
    /// Register an adapter under its own provider id.
    pub fn provider<P>(self, provider: P) -> Self
    where
        P: IdentityProvider + 'static,
    {
        let id = provider.provider_id().to_string();
        self.provider_as(id, Arc::new(provider))
    }

    /// Register an adapter under a custom key.
    pub fn provider_as(mut self, id: impl Into<String>, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    /// Build the [`IdentityRegistry`].
    pub fn build(self) -> IdentityRegistry {
        IdentityRegistry {
            providers: self.providers,
        }
    }
}

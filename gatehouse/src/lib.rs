//! # Gatehouse
//!
//! Identity-provider adapters behind one capability trait. Enable the
//! `gitlab` and `oidc` features for the adapters and `flow` for the registry.

pub use gatehouse_core::*;

#[cfg(feature = "flow")]
pub use gatehouse_flow as flow;
#[cfg(feature = "flow")]
pub use gatehouse_flow::{IdentityRegistry, ProviderKind, ProviderSettings};

#[cfg(feature = "oidc")]
pub use gatehouse_oidc as oidc;

#[cfg(feature = "gitlab")]
pub use gatehouse_providers_gitlab as gitlab;

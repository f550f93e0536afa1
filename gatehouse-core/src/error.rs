use thiserror::Error;

/// Errors that can occur while talking to an identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The discovery document could not be fetched.
    #[error("Discovery error: {url}: {source}")]
    Discovery {
        /// The discovery document URL.
        url: String,
        /// The transport or decode failure.
        #[source]
        source: Box<AuthError>,
    },
    /// The discovery document was fetched but does not have the expected shape.
    #[error("Malformed discovery document: {0}")]
    MalformedDiscovery(#[source] serde_json::Error),
    /// A discovered endpoint is not a valid URL.
    #[error("Invalid {name} in discovery document: {source}")]
    InvalidEndpoint {
        /// Field name in the discovery document.
        name: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The discovery document was published for a different issuer.
    #[error("Issuer mismatch: expected {expected}, provider returned {found}")]
    IssuerMismatch {
        /// The issuer we asked for.
        expected: String,
        /// The issuer the provider advertised.
        found: String,
    },
    /// The provider configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Group resolution was called without an access token.
    #[error("{0}: user session cannot be empty")]
    EmptySession(&'static str),
    /// The request never produced a response (connect failure, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote API answered with a status we do not accept.
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The response body was not the JSON we expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    /// The token was already expired or revoked at the provider.
    #[error("Token expired or revoked")]
    TokenRevoked,
    /// The provider does not publish a revocation endpoint.
    #[error("Token revocation not supported by this provider")]
    RevokeNotSupported,
    /// An ID token failed verification.
    #[error("Token error: {0}")]
    Token(String),
    /// No provider is registered under the requested id.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl AuthError {
    /// Whether this error is the "already revoked" signal from the transport.
    pub fn is_token_revoked(&self) -> bool {
        matches!(self, AuthError::TokenRevoked)
    }
}

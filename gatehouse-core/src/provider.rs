use crate::config::{ProviderConfig, ProviderDefaults};
use crate::discovery::ProviderMetadata;
use crate::error::AuthError;
use crate::http::HttpClient;
use crate::verifier::{IdTokenVerifier, JwksCache};
use url::Url;

/// OAuth2 client settings built from discovered endpoints.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Client id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    pub auth_url: Url,
    /// Token endpoint.
    pub token_url: Url,
    /// Redirect URL registered with the provider.
    pub redirect_url: Option<Url>,
    /// Scopes to request.
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// URL to send the user to for the authorization code flow.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id);
            if let Some(redirect) = &self.redirect_url {
                query.append_pair("redirect_uri", redirect.as_str());
            }
            query
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
        }
        url.into()
    }
}

/// Configuration and discovered state shared by every backend adapter.
///
/// Immutable once [`OidcProvider::discover`] returns.
pub struct OidcProvider {
    config: ProviderConfig,
    metadata: ProviderMetadata,
    oauth: OAuth2Config,
    verifier: IdTokenVerifier,
    http: HttpClient,
}

impl OidcProvider {
    /// Resolve defaults, run discovery and build the OAuth2 client and verifier.
    pub async fn discover(
        config: ProviderConfig,
        defaults: &ProviderDefaults,
    ) -> Result<Self, AuthError> {
        let http = match config.timeout()? {
            Some(timeout) => HttpClient::with_timeout(timeout)?,
            None => HttpClient::new()?,
        };
        Self::discover_with_client(config, defaults, http).await
    }

    /// Same as [`OidcProvider::discover`] with a caller supplied transport.
    pub async fn discover_with_client(
        config: ProviderConfig,
        defaults: &ProviderDefaults,
        http: HttpClient,
    ) -> Result<Self, AuthError> {
        let config = config.resolve(defaults);
        let metadata = ProviderMetadata::discover(&config.provider_url, &http).await?;
        log::info!(
            "discovered OIDC provider {} for client {}",
            metadata.issuer,
            config.client_id
        );

        let oauth = OAuth2Config {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: parse_endpoint("authorization_endpoint", &metadata.authorization_endpoint)?,
            token_url: parse_endpoint("token_endpoint", &metadata.token_endpoint)?,
            redirect_url: config.redirect_url.clone(),
            scopes: config.scopes.clone(),
        };
        let verifier = IdTokenVerifier::new(
            metadata.issuer.clone(),
            config.client_id.clone(),
            JwksCache::new(metadata.jwks_uri.clone(), http.clone()),
        );

        Ok(Self {
            config,
            metadata,
            oauth,
            verifier,
            http,
        })
    }

    /// Discovery base URL after defaults were applied.
    pub fn provider_url(&self) -> &str {
        &self.config.provider_url
    }

    /// OAuth2 client id.
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Scopes after defaults were applied.
    pub fn scopes(&self) -> &[String] {
        &self.config.scopes
    }

    /// Redirect URL, if configured.
    pub fn redirect_url(&self) -> Option<&Url> {
        self.config.redirect_url.as_ref()
    }

    /// The discovery document.
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// OAuth2 client settings.
    pub fn oauth(&self) -> &OAuth2Config {
        &self.oauth
    }

    /// ID token verifier bound to this client.
    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Transport used for every call to this provider.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value).map_err(|source| AuthError::InvalidEndpoint {
        name: name.to_string(),
        source,
    })
}

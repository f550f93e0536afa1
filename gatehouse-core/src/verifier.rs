use crate::error::AuthError;
use crate::http::HttpClient;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key id.
    pub kid: Option<String>,
    /// Key type, only `RSA` is usable.
    pub kty: String,
    /// Algorithm hint.
    pub alg: Option<String>,
    /// RSA modulus.
    pub n: Option<String>,
    /// RSA exponent.
    pub e: Option<String>,
}

impl Jwk {
    /// Build a `jsonwebtoken` key from the RSA components.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AuthError> {
        if self.kty != "RSA" {
            return Err(AuthError::Token(format!(
                "unsupported key type {}",
                self.kty
            )));
        }
        let n = self
            .n
            .as_deref()
            .ok_or_else(|| AuthError::Token("missing 'n' component in JWK".into()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| AuthError::Token("missing 'e' component in JWK".into()))?;

        DecodingKey::from_rsa_components(n, e).map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Signing algorithm the key is published for; RS256 when unspecified.
    pub fn algorithm(&self) -> Result<Algorithm, AuthError> {
        match self.alg.as_deref() {
            None | Some("RS256") => Ok(Algorithm::RS256),
            Some("RS384") => Ok(Algorithm::RS384),
            Some("RS512") => Ok(Algorithm::RS512),
            Some(other) => Err(AuthError::Token(format!("unsupported key algorithm {other}"))),
        }
    }
}

/// Identity claims carried by a verified ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    /// Subject identifier.
    pub sub: String,
    /// Email address, if the `email` scope was granted.
    #[serde(default)]
    pub email: Option<String>,
    /// Every other claim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    /// The keys.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Find a key by id; without an id the first key is used.
    pub fn find_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(id) => self.keys.iter().find(|k| k.kid.as_deref() == Some(id)),
            None => self.keys.first(),
        }
    }
}

/// Caches the provider's key set for a fixed TTL.
pub struct JwksCache {
    jwks_uri: String,
    http: HttpClient,
    jwks: RwLock<Option<(Jwks, Instant)>>,
    ttl: Duration,
}

impl JwksCache {
    /// Create an empty cache. Keys are fetched lazily.
    pub fn new(jwks_uri: impl Into<String>, http: HttpClient) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            http,
            jwks: RwLock::new(None),
            ttl: Duration::from_secs(3600),
        }
    }

    /// Override the cache lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Current key set, refetched once the TTL expires.
    pub async fn get_jwks(&self) -> Result<Jwks, AuthError> {
        {
            let read_guard = self.jwks.read().await;
            if let Some((jwks, fetched_at)) = read_guard.as_ref() {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(jwks.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Look up a key, refetching once if it is unknown (key rotation).
    pub async fn get_key(&self, kid: Option<&str>) -> Result<Option<Jwk>, AuthError> {
        let jwks = self.get_jwks().await?;
        if let Some(key) = jwks.find_key(kid) {
            return Ok(Some(key.clone()));
        }
        let jwks = self.refresh().await?;
        Ok(jwks.find_key(kid).cloned())
    }

    /// Unconditionally refetch the key set.
    pub async fn refresh(&self) -> Result<Jwks, AuthError> {
        let mut write_guard = self.jwks.write().await;
        let jwks: Jwks = self.http.get_json(&self.jwks_uri, &[]).await?;
        *write_guard = Some((jwks.clone(), Instant::now()));
        Ok(jwks)
    }
}

/// Verifies ID tokens issued by one provider for one client.
pub struct IdTokenVerifier {
    issuer: String,
    client_id: String,
    keys: JwksCache,
}

impl IdTokenVerifier {
    /// Bind a verifier to an issuer, a client id and the issuer's key set.
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>, keys: JwksCache) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            keys,
        }
    }

    /// The audience tokens must be issued for.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The issuer tokens must come from.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Check signature, issuer, audience and expiry, and return the claims.
    ///
    /// The token header must name the algorithm its key is published for.
    pub async fn verify<T: DeserializeOwned>(&self, id_token: &str) -> Result<T, AuthError> {
        let header = decode_header(id_token)
            .map_err(|e| AuthError::Token(format!("invalid ID token header: {e}")))?;

        let jwk = self
            .keys
            .get_key(header.kid.as_deref())
            .await?
            .ok_or_else(|| AuthError::Token("no matching key found in JWKS".into()))?;
        let algorithm = jwk.algorithm()?;
        if header.alg != algorithm {
            return Err(AuthError::Token(format!(
                "ID token signed with {:?}, key expects {algorithm:?}",
                header.alg
            )));
        }
        let decoding_key = jwk.to_decoding_key()?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_audience(std::slice::from_ref(&self.client_id));

        let token_data = decode::<T>(id_token, &decoding_key, &validation)
            .map_err(|e| AuthError::Token(format!("ID token validation failed: {e}")))?;
        Ok(token_data.claims)
    }
}

//! GitLab adapter: OIDC login against gitlab.com or a self-hosted instance,
//! group membership from the REST API, and token revocation.

use async_trait::async_trait;
use gatehouse_core::{
    AuthError, HttpClient, IdentityProvider, OAuthToken, OidcProvider, ProviderConfig,
    ProviderDefaults, SessionState,
};
use reqwest::Method;
use serde::Deserialize;
use std::fmt;

/// Discovery base URL used when none is configured.
pub const DEFAULT_PROVIDER_URL: &str = "https://gitlab.com";
/// Revocation endpoint used unless discovery publishes one.
pub const DEFAULT_REVOKE_URL: &str = "https://gitlab.com/oauth/revoke";
/// Group listing endpoint of gitlab.com.
pub const DEFAULT_GROUPS_URL: &str = "https://gitlab.com/api/v4/groups";
/// Scopes requested when none are configured. `api` unlocks the group listing.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "api", "read_user", "profile", "email"];

/// Compiled-in defaults for GitLab.
pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    provider_url: DEFAULT_PROVIDER_URL,
    scopes: DEFAULT_SCOPES,
};

const PROVIDER_ID: &str = "gitlab";
const GROUPS_PATH: &str = "/api/v4/groups";

#[derive(Deserialize)]
struct DiscoveryClaims {
    #[serde(default)]
    revocation_endpoint: Option<String>,
}

/// Only the id is kept; name, path and visibility are irrelevant to policy matching.
#[derive(Deserialize)]
struct Group {
    id: GroupId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Number(n) => write!(f, "{n}"),
            GroupId::Text(s) => f.write_str(s),
        }
    }
}

/// GitLab backend adapter.
pub struct GitLabProvider {
    core: OidcProvider,
    revoke_url: String,
    groups_url: String,
}

impl GitLabProvider {
    /// Run discovery and build the adapter.
    ///
    /// Empty provider URL and scopes fall back to [`DEFAULTS`]. A
    /// `revocation_endpoint` in the discovery document replaces
    /// [`DEFAULT_REVOKE_URL`].
    pub async fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        let core = OidcProvider::discover(config, &DEFAULTS).await?;
        Self::from_core(core)
    }

    /// Same as [`GitLabProvider::new`] with a caller supplied transport.
    pub async fn with_client(config: ProviderConfig, http: HttpClient) -> Result<Self, AuthError> {
        let core = OidcProvider::discover_with_client(config, &DEFAULTS, http).await?;
        Self::from_core(core)
    }

    fn from_core(core: OidcProvider) -> Result<Self, AuthError> {
        let claims: DiscoveryClaims = core.metadata().claims()?;
        let revoke_url = claims
            .revocation_endpoint
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_REVOKE_URL.to_string());
        let groups_url = format!("{}{GROUPS_PATH}", core.provider_url().trim_end_matches('/'));

        Ok(Self {
            core,
            revoke_url,
            groups_url,
        })
    }

    /// Where tokens are revoked.
    pub fn revoke_url(&self) -> &str {
        &self.revoke_url
    }

    /// Where the user's groups are listed.
    pub fn groups_url(&self) -> &str {
        &self.groups_url
    }
}

#[async_trait]
impl IdentityProvider for GitLabProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn core(&self) -> &OidcProvider {
        &self.core
    }

    /// Only the first page of the listing is read (GitLab pages 20 groups by
    /// default); users in more groups get a partial list.
    async fn resolve_groups(&self, session: &SessionState) -> Result<Vec<String>, AuthError> {
        let token = session
            .bearer_token()
            .ok_or(AuthError::EmptySession("identity/gitlab"))?;

        let authorization = token.authorization_header();
        let body = self
            .core
            .http()
            .send(
                Method::GET,
                &self.groups_url,
                &[("Authorization", authorization.as_str())],
                None,
            )
            .await?;
        log::debug!("identity/gitlab: groups response: {body}");

        let groups: Vec<Group> = serde_json::from_str(&body)?;
        Ok(groups.into_iter().map(|g| g.id.to_string()).collect())
    }

    async fn revoke(&self, token: &OAuthToken) -> Result<(), AuthError> {
        let form = [("access_token", token.access_token.as_str())];
        match self
            .core
            .http()
            .send(Method::POST, &self.revoke_url, &[], Some(&form))
            .await
        {
            Ok(_) => Ok(()),
            Err(AuthError::TokenRevoked) => {
                log::debug!("identity/gitlab: token was already revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_discovery(server: &MockServer, with_revocation: bool) {
        let issuer = server.uri();
        let mut document = json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/oauth/authorize"),
            "token_endpoint": format!("{issuer}/oauth/token"),
            "userinfo_endpoint": format!("{issuer}/oauth/userinfo"),
            "jwks_uri": format!("{issuer}/oauth/discovery/keys"),
        });
        if with_revocation {
            document["revocation_endpoint"] = json!(format!("{issuer}/oauth/revoke"));
        }
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(server)
            .await;
    }

    async fn provider(server: &MockServer) -> GitLabProvider {
        mount_discovery(server, true).await;
        GitLabProvider::new(ProviderConfig::new("client", "secret").with_provider_url(server.uri()))
            .await
            .unwrap()
    }

    fn session(token: &str) -> SessionState {
        SessionState::new(PROVIDER_ID, "1").with_token(OAuthToken::bearer(token))
    }

    #[test]
    fn defaults_point_at_gitlab_com() {
        let config = ProviderConfig::new("client", "secret").resolve(&DEFAULTS);
        assert_eq!(config.provider_url, "https://gitlab.com");
        assert_eq!(
            config.scopes,
            vec!["openid", "api", "read_user", "profile", "email"]
        );
        assert_eq!(
            format!("{}{GROUPS_PATH}", config.provider_url),
            DEFAULT_GROUPS_URL
        );
    }

    #[tokio::test]
    async fn discovery_overrides_revoke_url() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        assert_eq!(provider.revoke_url(), format!("{}/oauth/revoke", server.uri()));
        assert_eq!(provider.groups_url(), format!("{}/api/v4/groups", server.uri()));
        assert_eq!(provider.core().scopes(), DEFAULT_SCOPES);
    }

    #[tokio::test]
    async fn revoke_url_defaults_without_discovery_claim() {
        let server = MockServer::start().await;
        mount_discovery(&server, false).await;
        let provider = GitLabProvider::new(
            ProviderConfig::new("client", "secret")
                .with_provider_url(server.uri())
                .with_scopes(["openid", "read_api"]),
        )
        .await
        .unwrap();
        assert_eq!(provider.revoke_url(), DEFAULT_REVOKE_URL);
        assert_eq!(provider.core().scopes(), ["openid", "read_api"]);
    }

    #[tokio::test]
    async fn sub_second_timeout_still_constructs() {
        let server = MockServer::start().await;
        mount_discovery(&server, true).await;
        let provider = GitLabProvider::new(
            ProviderConfig::new("client", "secret")
                .with_provider_url(server.uri())
                .with_timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap();
        assert_eq!(provider.revoke_url(), format!("{}/oauth/revoke", server.uri()));
    }

    #[tokio::test]
    async fn verified_id_token_opens_a_session() {
        const KEY_PEM: &str = include_str!("../../gatehouse-core/testdata/id_token_key.pem");
        const KEY_N: &str = include_str!("../../gatehouse-core/testdata/id_token_key.n");

        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("GET"))
            .and(path("/oauth/discovery/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kid": "gl", "kty": "RSA", "alg": "RS256", "n": KEY_N.trim(), "e": "AQAB"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some("gl".into());
        let id_token = jsonwebtoken::encode(
            &header,
            &json!({
                "iss": server.uri(),
                "aud": "client",
                "sub": "77",
                "email": "dev@example.com",
                "groups_direct": ["org/team"],
                "exp": chrono::Utc::now().timestamp() + 600,
            }),
            &jsonwebtoken::EncodingKey::from_rsa_pem(KEY_PEM.as_bytes()).unwrap(),
        )
        .unwrap();

        let session = provider
            .session_from_id_token(&id_token, OAuthToken::bearer("user-token"))
            .await
            .unwrap();
        assert_eq!(session.provider_id, "gitlab");
        assert_eq!(session.subject, "77");
        assert_eq!(session.email.as_deref(), Some("dev@example.com"));
        assert_eq!(session.claims["groups_direct"], json!(["org/team"]));
        assert_eq!(session.bearer_token().unwrap().access_token, "user-token");
    }

    #[tokio::test]
    async fn malformed_discovery_fails_construction() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result =
            GitLabProvider::new(ProviderConfig::new("client", "secret").with_provider_url(server.uri()))
                .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_session_makes_no_request() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("GET"))
            .and(path(GROUPS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let no_token = SessionState::new(PROVIDER_ID, "1");
        let err = provider.resolve_groups(&no_token).await.unwrap_err();
        assert!(matches!(err, AuthError::EmptySession(_)));

        let err = provider.resolve_groups(&session("")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmptySession(_)));
    }

    #[tokio::test]
    async fn resolves_group_ids_in_order() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("GET"))
            .and(path(GROUPS_PATH))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "name": "one", "path": "one", "visibility": "private"},
                {"id": "2", "name": "two", "full_path": "org/two"},
                {"id": "42", "name": "answer", "share_with_group_lock": false},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let groups = provider.resolve_groups(&session("user-token")).await.unwrap();
        assert_eq!(groups, vec!["1", "2", "42"]);
    }

    #[tokio::test]
    async fn numeric_ids_are_stringified() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("GET"))
            .and(path(GROUPS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 7}, {"id": 9000}])),
            )
            .mount(&server)
            .await;

        let groups = provider.resolve_groups(&session("t")).await.unwrap();
        assert_eq!(groups, vec!["7", "9000"]);
    }

    #[tokio::test]
    async fn reads_only_the_first_page() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        let next = format!("<{}{GROUPS_PATH}?page=2&per_page=2>; rel=\"next\"", server.uri());
        Mock::given(method("GET"))
            .and(path(GROUPS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-next-page", "2")
                    .insert_header("x-total", "4")
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([{"id": 1}, {"id": 2}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let groups = provider.resolve_groups(&session("t")).await.unwrap();
        assert_eq!(groups, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn group_listing_errors_propagate() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("GET"))
            .and(path(GROUPS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider.resolve_groups(&session("t")).await.unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn revoke_posts_access_token() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth/revoke"))
            .and(body_string("access_token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        provider.revoke(&OAuthToken::bearer("abc")).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_treats_already_revoked_as_success() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth/revoke"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_token",
                "error_description": "Token expired or revoked"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(provider.revoke(&OAuthToken::bearer("abc")).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_propagates_other_bad_requests() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth/revoke"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "The provided authorization grant is invalid"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider.revoke(&OAuthToken::bearer("abc")).await.unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn revoke_propagates_server_errors() {
        let server = MockServer::start().await;
        let provider = provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth/revoke"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider.revoke(&OAuthToken::bearer("abc")).await.unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 500, .. }));
    }
}

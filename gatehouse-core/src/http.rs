use crate::error::AuthError;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// User agent sent with every provider request.
pub const USER_AGENT: &str = concat!("gatehouse/", env!("CARGO_PKG_VERSION"));

/// `error_description` a provider returns for a token that is already dead.
pub const TOKEN_REVOKED_DESCRIPTION: &str = "Token expired or revoked";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper around [`reqwest::Client`] that applies the provider
/// response conventions shared by all adapters.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: String,
}

impl HttpClient {
    /// Build a client with the default timeout.
    pub fn new() -> Result<Self, AuthError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build a client whose requests abort after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, AuthError> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// The underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Send a request and return the raw body of a `200 OK` response.
    ///
    /// A `400` whose `error_description` is [`TOKEN_REVOKED_DESCRIPTION`]
    /// maps to [`AuthError::TokenRevoked`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        form: Option<&[(&str, &str)]>,
    ) -> Result<String, AuthError> {
        let mut request = self.inner.request(method, url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => Ok(body),
            StatusCode::BAD_REQUEST => {
                let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
                match parsed {
                    Some(e) if e.error_description == TOKEN_REVOKED_DESCRIPTION => {
                        Err(AuthError::TokenRevoked)
                    }
                    _ => Err(AuthError::UnexpectedStatus {
                        status: status.as_u16(),
                        body,
                    }),
                }
            }
            _ => Err(AuthError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }),
        }
    }

    /// Send a request and decode the `200 OK` body as JSON.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        form: Option<&[(&str, &str)]>,
    ) -> Result<T, AuthError> {
        let body = self.send(method, url, headers, form).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, AuthError> {
        self.send_json(Method::GET, url, headers, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_user_agent_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .and(header("user-agent", USER_AGENT))
            .and(header("authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let value: serde_json::Value = client
            .get_json(
                &format!("{}/thing", server.uri()),
                &[("Authorization", "Bearer t")],
            )
            .await
            .unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn posts_form_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/form"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("key=value"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        client
            .send(
                Method::POST,
                &format!("{}/form", server.uri()),
                &[],
                Some(&[("key", "value")]),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_or_revoked_description_is_token_revoked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_token",
                "error_description": "Token expired or revoked"
            })))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .unwrap()
            .send(Method::POST, &server.uri(), &[], None)
            .await
            .unwrap_err();
        assert!(err.is_token_revoked());
    }

    #[tokio::test]
    async fn other_invalid_grant_replies_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The provided authorization grant is invalid"
            })))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .unwrap()
            .send(Method::POST, &server.uri(), &[], None)
            .await
            .unwrap_err();
        assert!(!err.is_token_revoked());
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn other_statuses_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "invalid_request"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let err = client
            .send(Method::POST, &format!("{}/bad", server.uri()), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 400, .. }));

        let err = client
            .send(Method::POST, &format!("{}/boom", server.uri()), &[], None)
            .await
            .unwrap_err();
        match err {
            AuthError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .unwrap()
            .get_json::<serde_json::Value>(&server.uri(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }
}

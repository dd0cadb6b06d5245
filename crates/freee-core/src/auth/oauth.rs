use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::Settings;

use super::utils::truncate_body;
use super::{AuthError, CompanyId, Credential};

/// Out-of-band redirect: the authorization server displays the code for the user to
/// paste back instead of redirecting.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

pub(crate) const USER_AGENT: &str = "freee-docs/0.1.0";

/// Timeout applied to token endpoint calls.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth client configuration supplied by consumers.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl OAuthConfig {
    pub fn new<S: Into<String>>(client_id: S, client_secret: S) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: OOB_REDIRECT_URI.to_owned(),
        }
    }
}

/// OAuth endpoints used for the authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorization_url: Url,
    pub token_url: Url,
}

/// Performs OAuth token exchanges with the freee accounts server.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    config: OAuthConfig,
    endpoints: OAuthEndpoints,
}

impl OAuthClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, AuthError> {
        Self::with_endpoints(
            OAuthConfig::new(settings.client_id.clone(), settings.client_secret.clone()),
            OAuthEndpoints {
                authorization_url: settings.authorize_url.clone(),
                token_url: settings.token_url.clone(),
            },
        )
    }

    pub fn with_endpoints(
        config: OAuthConfig,
        endpoints: OAuthEndpoints,
    ) -> Result<Self, AuthError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            config,
            endpoints,
        })
    }

    /// URL the user opens to approve access and pick a company.
    pub fn authorization_url(&self) -> Url {
        let mut url = self.endpoints.authorization_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("prompt", "select_company");
        url
    }

    /// Exchange an authorization code for a new credential.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        debug!("exchanging authorization code");
        let payload = self.post_token(&form).await?;
        payload.into_credential(None)
    }

    /// Obtain a fresh token pair using the credential's refresh token.
    ///
    /// The returned credential keeps the company bound to `existing`.
    pub async fn refresh(&self, existing: &Credential) -> Result<Credential, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", existing.refresh_token.as_str()),
        ];
        debug!("refreshing access token");
        let payload = self.post_token(&form).await?;
        let refreshed = payload.into_credential(Some(&existing.refresh_token))?;
        Ok(existing.merge_refreshed(refreshed))
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(self.endpoints.token_url.clone())
            .form(form)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default)]
    company_id: Option<CompanyId>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenResponse {
    fn into_credential(self, fallback_refresh: Option<&str>) -> Result<Credential, AuthError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| fallback_refresh.map(ToOwned::to_owned))
            .ok_or(AuthError::IncompleteTokenResponse("refresh_token"))?;
        Ok(Credential {
            access_token: self.access_token,
            refresh_token,
            company_id: self.company_id,
            extra: self.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::StatusCode;

    fn client(server: &MockServer) -> OAuthClient {
        let endpoints = OAuthEndpoints {
            authorization_url: Url::parse("https://accounts.example.com/public_api/authorize")
                .unwrap(),
            token_url: Url::parse(&server.url("/public_api/token")).unwrap(),
        };
        OAuthClient::with_endpoints(OAuthConfig::new("client-id", "client-secret"), endpoints)
            .unwrap()
    }

    #[test]
    fn authorization_url_carries_oob_redirect_and_company_prompt() {
        let server = MockServer::start();
        let url = client(&server).authorization_url();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("response_type".to_string(), "code".to_string()),
                ("client_id".to_string(), "client-id".to_string()),
                ("redirect_uri".to_string(), OOB_REDIRECT_URI.to_string()),
                ("prompt".to_string(), "select_company".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn exchange_code_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/public_api/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=code123")
                .body_contains("client_secret=client-secret");
            then.status(200).json_body(serde_json::json!({
                "access_token": "abc123",
                "refresh_token": "refresh456",
                "company_id": 1001,
                "token_type": "bearer",
                "expires_in": 21600
            }));
        });

        let credential = client(&server).exchange_code("code123").await.unwrap();
        mock.assert();
        assert_eq!(credential.access_token, "abc123");
        assert_eq!(credential.refresh_token, "refresh456");
        assert_eq!(credential.company_id, Some(CompanyId(1001)));
        assert_eq!(credential.extra["token_type"], "bearer");
    }

    #[tokio::test]
    async fn exchange_code_requires_refresh_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/public_api/token");
            then.status(200)
                .json_body(serde_json::json!({ "access_token": "abc123" }));
        });

        let err = client(&server).exchange_code("code123").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::IncompleteTokenResponse("refresh_token")
        ));
    }

    #[tokio::test]
    async fn refresh_preserves_company_and_sends_refresh_grant() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/public_api/token")
                .body_contains("grant_type=refresh_token")
                .body_contains("refresh_token=refresh456");
            then.status(200).json_body(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "company_id": null
            }));
        });

        let existing = Credential::new("old-access", "refresh456").with_company(CompanyId(5));
        let refreshed = client(&server).refresh(&existing).await.unwrap();
        mock.assert();
        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(refreshed.refresh_token, "new-refresh");
        assert_eq!(refreshed.company_id, Some(CompanyId(5)));
    }

    #[tokio::test]
    async fn refresh_falls_back_to_existing_refresh_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/public_api/token");
            then.status(200)
                .json_body(serde_json::json!({ "access_token": "new-access" }));
        });

        let existing = Credential::new("old-access", "refresh456");
        let refreshed = client(&server).refresh(&existing).await.unwrap();
        assert_eq!(refreshed.refresh_token, "refresh456");
    }

    #[tokio::test]
    async fn token_endpoint_failure() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/public_api/token");
            then.status(400).body("invalid_grant");
        });

        let err = client(&server).exchange_code("bad").await.unwrap_err();
        mock.assert();
        match err {
            AuthError::TokenEndpoint { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "invalid_grant");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

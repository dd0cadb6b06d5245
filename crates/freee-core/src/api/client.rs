use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::utils::truncate_body;
use crate::auth::{AuthSession, USER_AGENT};

use super::{ApiError, ApiResult};

/// Timeout for lightweight calls such as the company list.
pub const LIGHT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for document list/detail calls.
pub const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Session shared between the client and anything that needs to bind a company.
pub type SharedSession = Arc<Mutex<AuthSession>>;

/// Per-call request settings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn light() -> Self {
        Self {
            query: Vec::new(),
            timeout: LIGHT_TIMEOUT,
        }
    }

    pub fn document() -> Self {
        Self {
            query: Vec::new(),
            timeout: DOCUMENT_TIMEOUT,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Bearer-authenticated HTTP client for the freee resource API.
///
/// A 401 triggers exactly one token refresh and one replay of the same request per
/// call; whatever the replay returns is handed back unchanged.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SharedSession,
}

impl ApiClient {
    pub fn new(session: SharedSession, base_url: Url) -> ApiResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub async fn get(&self, path: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.request(Method::GET, path, options).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> ApiResult<Response> {
        let url = self.base_url.join(path)?;
        let token = self.session.lock().await.bearer_token()?.to_owned();

        let response = self.send(&method, &url, options, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(%url, "request unauthorized; refreshing access token");
        let refreshed = self.session.lock().await.refresh().await;
        match refreshed {
            Ok(token) => {
                let retried = self.send(&method, &url, options, &token).await?;
                debug!(status = %retried.status(), "replayed request after refresh");
                Ok(retried)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; returning original response");
                Ok(response)
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
        token: &str,
    ) -> ApiResult<Response> {
        debug!(%method, %url, query = ?options.query, "sending request");
        let response = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .query(&options.query)
            .timeout(options.timeout)
            .send()
            .await?;
        debug!(status = %response.status(), "received response");
        Ok(response)
    }
}

/// Decode a successful JSON response.
///
/// Non-2xx statuses, non-JSON content types (such as an HTML error page) and malformed
/// bodies all become errors that keep a truncated copy of the body.
pub async fn json_body(response: Response) -> ApiResult<Value> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body: truncate_body(&body),
        });
    }
    if !content_type.to_ascii_lowercase().contains("application/json") {
        return Err(ApiError::UnexpectedContentType {
            content_type,
            body: truncate_body(&body),
        });
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        source,
        body: truncate_body(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, PROBE_PATH};
    use crate::test_support::{oauth_client, MemoryStore};
    use httpmock::prelude::*;

    fn client(server: &MockServer, store: MemoryStore) -> ApiClient {
        let base = Url::parse(&server.base_url()).unwrap();
        let session = AuthSession::new(store, oauth_client(server), &base, "default").unwrap();
        ApiClient::new(Arc::new(Mutex::new(session)), base).unwrap()
    }

    async fn loaded_client(server: &MockServer, store: MemoryStore) -> ApiClient {
        let client = client(server, store);
        // Establish the credential through the normal verification path.
        let mut interaction = crate::test_support::ScriptedInteraction::new(Vec::<String>::new());
        client
            .session()
            .lock()
            .await
            .ensure_valid(&mut interaction)
            .await
            .unwrap();
        client
    }

    fn probe_ok(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path(PROBE_PATH).header("authorization", "Bearer old");
            then.status(200);
        });
    }

    #[tokio::test]
    async fn unauthorized_refreshes_once_and_replays() {
        let server = MockServer::start();
        probe_ok(&server);
        let stale = server.mock(|when, then| {
            when.method(GET)
                .path("/api/1/invoices")
                .query_param("company_id", "1")
                .header("authorization", "Bearer old");
            then.status(401);
        });
        let fresh = server.mock(|when, then| {
            when.method(GET)
                .path("/api/1/invoices")
                .query_param("company_id", "1")
                .header("authorization", "Bearer new");
            then.status(200).body("{}");
        });
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(serde_json::json!({
                "access_token": "new",
                "refresh_token": "r2"
            }));
        });

        let store = MemoryStore::with(Credential::new("old", "r1"));
        let client = loaded_client(&server, store.clone()).await;
        let options = RequestOptions::document().query("company_id", 1);
        let response = client.get("/api/1/invoices", &options).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        stale.assert();
        fresh.assert();
        refresh.assert();
        assert_eq!(store.current().unwrap().access_token, "new");
    }

    #[tokio::test]
    async fn second_unauthorized_is_surfaced_without_looping() {
        let server = MockServer::start();
        probe_ok(&server);
        let stale = server.mock(|when, then| {
            when.method(GET)
                .path("/api/1/invoices")
                .header("authorization", "Bearer old");
            then.status(401);
        });
        let still_denied = server.mock(|when, then| {
            when.method(GET)
                .path("/api/1/invoices")
                .header("authorization", "Bearer new");
            then.status(401).body("denied again");
        });
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(serde_json::json!({
                "access_token": "new",
                "refresh_token": "r2"
            }));
        });

        let client = loaded_client(&server, MemoryStore::with(Credential::new("old", "r1"))).await;
        let response = client
            .get("/api/1/invoices", &RequestOptions::document())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(stale.hits(), 1);
        assert_eq!(still_denied.hits(), 1);
        assert_eq!(refresh.hits(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_returns_original_response() {
        let server = MockServer::start();
        probe_ok(&server);
        let stale = server.mock(|when, then| {
            when.method(GET).path("/api/1/invoices");
            then.status(401).body("expired");
        });
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400).body("invalid_grant");
        });

        let client = loaded_client(&server, MemoryStore::with(Credential::new("old", "r1"))).await;
        let response = client
            .get("/api/1/invoices", &RequestOptions::document())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.text().await.unwrap(), "expired");
        assert_eq!(stale.hits(), 1);
        assert_eq!(refresh.hits(), 1);
    }

    #[tokio::test]
    async fn refresh_budget_is_per_call() {
        let server = MockServer::start();
        probe_ok(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api/1/invoices");
            then.status(401);
        });
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400);
        });

        let client = loaded_client(&server, MemoryStore::with(Credential::new("old", "r1"))).await;
        for _ in 0..2 {
            let response = client
                .get("/api/1/invoices", &RequestOptions::document())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(refresh.hits(), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let server = MockServer::start();
        probe_ok(&server);
        let failing = server.mock(|when, then| {
            when.method(GET).path("/api/1/invoices");
            then.status(500);
        });
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200);
        });

        let client = loaded_client(&server, MemoryStore::with(Credential::new("old", "r1"))).await;
        let response = client
            .get("/api/1/invoices", &RequestOptions::document())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failing.hits(), 1);
        assert_eq!(refresh.hits(), 0);
    }

    #[tokio::test]
    async fn request_without_credential_is_an_auth_error() {
        let server = MockServer::start();
        let client = client(&server, MemoryStore::default());
        let err = client
            .get("/api/1/companies", &RequestOptions::light())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(crate::auth::AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn json_body_rejects_html() {
        let server = MockServer::start();
        probe_ok(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api/1/invoices");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html>not here</html>");
        });

        let client = loaded_client(&server, MemoryStore::with(Credential::new("old", "r1"))).await;
        let response = client
            .get("/api/1/invoices", &RequestOptions::document())
            .await
            .unwrap();
        let err = json_body(response).await.unwrap_err();
        match err {
            ApiError::UnexpectedContentType { content_type, body } => {
                assert!(content_type.starts_with("text/html"));
                assert_eq!(body, "<html>not here</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

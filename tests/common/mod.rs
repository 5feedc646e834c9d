//! Common test utilities for E2E tests

#![allow(dead_code)]

use herokugate::{AppState, config};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SESSION_COOKIE: &str = "herokugate_session";
pub const HEROKU_ACCEPT: &str = "application/vnd.heroku+json; version=3";

/// Test server instance
///
/// Runs the real router on a random port against a mock Heroku.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    /// Mock of id.heroku.com and api.heroku.com
    pub provider: MockServer,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

/// Result of `GET /login/start`
pub struct StartedLogin {
    pub cookie: String,
    pub state: String,
    pub authorization_url: Url,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_provider_timeout(5).await
    }

    /// Test server whose provider calls give up after `timeout_seconds`
    pub async fn with_provider_timeout(timeout_seconds: u64) -> Self {
        let provider = MockServer::start().await;

        // Bind first so the redirect base can name the real port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
            },
            oauth: config::OAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                authorize_url: format!("{}/oauth/authorize", provider.uri()),
                token_url: format!("{}/oauth/token", provider.uri()),
                redirect_base: addr_str.clone(),
                scopes: "identity".to_string(),
            },
            provider: config::ProviderConfig {
                api_base: provider.uri(),
                api_accept: HEROKU_ACCEPT.to_string(),
            },
            session: config::SessionConfig {
                secret: "test-secret-key-32-bytes-long!!!".to_string(),
                max_age_seconds: 28_800,
                backend: config::SessionBackendKind::Memory,
                redis_url: None,
            },
            http: config::HttpConfig {
                timeout_seconds,
                connect_timeout_seconds: 2,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        herokugate::metrics::init_metrics();
        let state = AppState::new(config).await.unwrap();
        let app = herokugate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr: addr_str,
            state,
            provider,
            client,
        }
    }

    /// Get full URL for a path on the service
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path`, optionally presenting a session cookie
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, format!("{SESSION_COOKIE}={cookie}"));
        }
        request.send().await.unwrap()
    }

    /// Begin a login and capture the session cookie and issued state
    pub async fn start_login(&self, cookie: Option<&str>) -> StartedLogin {
        let response = self.get("/login/start", cookie).await;
        assert_eq!(response.status(), reqwest::StatusCode::FOUND);

        let authorization_url = Url::parse(location(&response)).unwrap();
        let state = query_value(&authorization_url, "state").expect("state parameter");
        let cookie = session_cookie(&response).expect("session cookie");

        StartedLogin {
            cookie,
            state,
            authorization_url,
        }
    }

    /// Deliver the provider callback
    pub async fn callback(&self, cookie: &str, query: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .get(self.url("/login/callback"))
            .header(COOKIE, format!("{SESSION_COOKIE}={cookie}"))
            .query(query)
            .send()
            .await
            .unwrap()
    }

    /// Run the whole flow and return the authenticated session cookie
    pub async fn login(&self) -> String {
        let login = self.start_login(None).await;
        let response = self
            .callback(
                &login.cookie,
                &[("code", "auth-code"), ("state", login.state.as_str())],
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::FOUND);
        assert_eq!(location(&response), "/home");
        session_cookie(&response).expect("authenticated session cookie")
    }

    /// Token endpoint answers with `access_token`, expecting `calls` requests
    pub async fn mock_token_success(&self, access_token: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "refresh_token": "refresh-token",
                "token_type": "Bearer",
                "expires_in": 28799,
                "user_id": "01234567-89ab-cdef-0123-456789abcdef",
                "session_nonce": "2bf3ec81"
            })))
            .expect(calls)
            .mount(&self.provider)
            .await;
    }

    /// Token endpoint answers with `status`
    pub async fn mock_token_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "id": "unauthorized",
                "message": "Invalid credentials provided."
            })))
            .expect(1)
            .mount(&self.provider)
            .await;
    }

    /// Account endpoint answers for `access_token`, expecting `calls` requests
    pub async fn mock_account(&self, access_token: &str, email: &str, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/account"))
            .and(header("authorization", format!("Bearer {access_token}").as_str()))
            .and(header("accept", HEROKU_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allow_tracking": true,
                "beta": false,
                "created_at": "2012-01-01T12:00:00Z",
                "email": email,
                "federated": false,
                "id": "01234567-89ab-cdef-0123-456789abcdef",
                "last_login": "2012-01-01T12:00:00Z",
                "name": "Tina Edmonds",
                "two_factor_authentication": false,
                "verified": true
            })))
            .expect(calls)
            .mount(&self.provider)
            .await;
    }
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

/// Value of the session cookie set by `response`, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .find_map(|value| {
            let raw = value.to_str().ok()?;
            let cookie_pair = raw.split(';').next()?;
            let (name, value) = cookie_pair.split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        })
}

/// Raw `Set-Cookie` header for the session cookie
pub fn session_set_cookie_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(ToString::to_string)
}

pub fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.to_string())
}

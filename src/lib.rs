//! HerokuGate - sign in with Heroku and read the account on the user's behalf
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /login/start, /login/callback, /logout                   │
//! │  - /home, /account (require a stored token)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     OAuth Flow                               │
//! │  - State tokens, authorization redirect                     │
//! │  - Code exchange, authenticated API calls                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Session Store                            │
//! │  - Sealed per-session records (Moka or Redis)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: OAuth flow, session identity, middleware
//! - `store`: Session-scoped token storage
//! - `api`: Heroku API client and protected pages
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// Cloned for each request. Holds no per-user data: everything tied to a
/// browser lives in the session store, keyed by session id.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Login flow controller
    pub flow: Arc<auth::OAuthFlow>,

    /// Session cookie signing
    pub cookies: Arc<auth::SessionCookies>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Validate OAuth client settings
    /// 2. Derive session keys
    /// 3. Connect the session backend
    /// 4. Build the outbound HTTP client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. OAuth client
        let client = config.oauth_client()?;
        tracing::info!(
            client_id = %client.client_id,
            redirect_uri = %client.redirect_uri,
            scopes = ?client.scopes,
            "OAuth client configured"
        );

        // 2. Session keys and cookies
        let keys = auth::SessionKeys::derive(&config.session.secret)?;
        let cookies = auth::SessionCookies::new(
            &keys.signing,
            config.should_use_secure_cookies(),
            config.session.max_age_seconds,
        )?;
        if !config.should_use_secure_cookies() {
            tracing::warn!(
                redirect_base = %config.oauth.redirect_base,
                "Using insecure session cookies for local development"
            );
        }

        // 3. Session backend
        let ttl_seconds = u64::try_from(config.session.max_age_seconds)
            .map_err(|_| error::AppError::Config("session.max_age_seconds".to_string()))?;
        let backend = match config.session.backend {
            config::SessionBackendKind::Memory => {
                tracing::warn!(
                    "Using in-memory session store; sessions are lost on restart and not shared between instances"
                );
                store::SessionBackend::Memory(store::MemoryBackend::new(Duration::from_secs(
                    ttl_seconds,
                )))
            }
            config::SessionBackendKind::Redis => {
                let url = config.session.redis_url.as_deref().ok_or_else(|| {
                    error::AppError::Config(
                        "session.redis_url is required when session.backend=redis".to_string(),
                    )
                })?;
                let backend = store::RedisBackend::connect(url, ttl_seconds).await?;
                tracing::info!("Redis session store connected");
                store::SessionBackend::Redis(backend)
            }
        };
        let token_store =
            store::SessionTokenStore::new(backend, store::RecordSealer::new(&keys.encryption));

        // 4. HTTP client for provider calls
        let http_client = reqwest::Client::builder()
            .user_agent("HerokuGate/0.1.0")
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let api = api::ApiClient::new(
            http_client.clone(),
            &config.provider.api_base,
            &config.provider.api_accept,
        )?;
        let flow = auth::OAuthFlow::new(
            client,
            auth::TokenExchanger::new(http_client),
            token_store,
            api,
        );

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            flow: Arc::new(flow),
            cookies: Arc::new(cookies),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::account_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

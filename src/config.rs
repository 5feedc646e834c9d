//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! Client credentials, the redirect base, the requested scopes and the
//! session secret have no defaults. Startup fails when any is missing.

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use url::Url;

use crate::error::AppError;

/// Path the provider redirects back to, appended to `oauth.redirect_base`.
pub const CALLBACK_PATH: &str = "/login/callback";

const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Environment variables understood by earlier deployments of this service.
///
/// They only apply when the `HEROKUGATE__*` equivalent is not set.
const LEGACY_ENV_FALLBACKS: &[(&str, &str)] = &[
    ("oauth.client_id", "HEROKU_OAUTH_ID"),
    ("oauth.client_secret", "HEROKU_OAUTH_SECRET"),
    ("server.port", "PORT"),
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub provider: ProviderConfig,
    pub session: SessionConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// OAuth client registration with the identity provider
#[derive(Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization endpoint
    pub authorize_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Public origin of this service (e.g., "https://my-app.herokuapp.com")
    pub redirect_base: String,
    /// Requested scopes, separated by spaces or commas
    pub scopes: String,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_base", &self.redirect_base)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Downstream provider API
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API base URL (e.g., "https://api.heroku.com")
    pub api_base: String,
    /// Accept header the provider requires on every API call
    pub api_accept: String,
}

/// Where session records live
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// In-process cache; single-instance deployments only
    #[default]
    Memory,
    /// Shared Redis store
    Redis,
}

/// Session configuration
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret the cookie signing and record encryption keys derive from (32+ bytes)
    pub secret: String,
    /// Session lifetime in seconds (default: 28800 = 8 hours)
    pub max_age_seconds: i64,
    #[serde(default)]
    pub backend: SessionBackendKind,
    /// Required when `backend = "redis"`
    pub redis_url: Option<String>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("max_age_seconds", &self.max_age_seconds)
            .field("backend", &self.backend)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout for provider calls
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Validated OAuth client settings
///
/// Built once from [`AppConfig`] and never mutated afterwards.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    /// Must match the URI registered with the provider exactly
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. Legacy environment variables (HEROKU_OAUTH_ID, HEROKU_OAUTH_SECRET, PORT)
    /// 3. config/default.toml (if exists)
    /// 4. config/local.toml (if exists)
    /// 5. Environment variables (HEROKUGATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("oauth.authorize_url", "https://id.heroku.com/oauth/authorize")?
            .set_default("oauth.token_url", "https://id.heroku.com/oauth/token")?
            .set_default("provider.api_base", "https://api.heroku.com")?
            .set_default(
                "provider.api_accept",
                "application/vnd.heroku+json; version=3",
            )?
            .set_default("session.max_age_seconds", 28_800)?
            .set_default("session.backend", "memory")?
            .set_default("http.timeout_seconds", 10)?
            .set_default("http.connect_timeout_seconds", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        for (key, var) in LEGACY_ENV_FALLBACKS {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(*key, value)?;
            }
        }
        if let Ok(app_name) = std::env::var("HEROKU_APP_NAME") {
            builder = builder.set_default(
                "oauth.redirect_base",
                format!("https://{app_name}.herokuapp.com"),
            )?;
        }

        let config = builder
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("HEROKUGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Build the immutable OAuth client settings
    ///
    /// # Errors
    /// Returns `AppError::Config` for unparsable URLs or an empty scope list
    pub fn oauth_client(&self) -> Result<OAuthClientConfig, AppError> {
        let oauth = &self.oauth;

        let authorize_url = parse_endpoint("oauth.authorize_url", &oauth.authorize_url)?;
        let token_url = parse_endpoint("oauth.token_url", &oauth.token_url)?;
        let redirect_base = parse_endpoint("oauth.redirect_base", &oauth.redirect_base)?;
        let redirect_uri = redirect_base
            .join(CALLBACK_PATH)
            .map_err(|e| AppError::Config(format!("oauth.redirect_base: {e}")))?;

        let scopes = parse_scopes(&oauth.scopes);
        if scopes.is_empty() {
            return Err(AppError::Config(
                "oauth.scopes must name at least one scope".to_string(),
            ));
        }

        Ok(OAuthClientConfig {
            client_id: oauth.client_id.trim().to_string(),
            client_secret: oauth.client_secret.clone(),
            authorize_url,
            token_url,
            redirect_uri,
            scopes,
        })
    }

    /// Cookies are `Secure` unless the service is reached over plain http on
    /// a local host.
    pub fn should_use_secure_cookies(&self) -> bool {
        match Url::parse(&self.oauth.redirect_base) {
            Ok(url) => url.scheme() == "https" || !is_local_host(url.host_str().unwrap_or("")),
            Err(_) => true,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(AppError::Config("oauth.client_id must be set".to_string()));
        }
        if self.oauth.client_secret.trim().is_empty() {
            return Err(AppError::Config(
                "oauth.client_secret must be set".to_string(),
            ));
        }

        let client = self.oauth_client()?;
        for (key, url) in [
            ("oauth.authorize_url", &client.authorize_url),
            ("oauth.token_url", &client.token_url),
            ("oauth.redirect_base", &client.redirect_uri),
        ] {
            require_https_unless_local(key, url)?;
        }
        let api_base = parse_endpoint("provider.api_base", &self.provider.api_base)?;
        require_https_unless_local("provider.api_base", &api_base)?;

        if self.session.secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age_seconds <= 0 {
            return Err(AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.backend == SessionBackendKind::Redis
            && self
                .session
                .redis_url
                .as_deref()
                .map(str::trim)
                .is_none_or(str::is_empty)
        {
            return Err(AppError::Config(
                "session.redis_url is required when session.backend=redis".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 || self.http.connect_timeout_seconds == 0 {
            return Err(AppError::Config(
                "http timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Split a scope setting on spaces and commas.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_endpoint(key: &str, raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(AppError::Config(format!("{key} must be an absolute URL")));
    }
    Ok(url)
}

fn require_https_unless_local(key: &str, url: &Url) -> Result<(), AppError> {
    if url.scheme() == "https" || is_local_host(url.host_str().unwrap_or("")) {
        return Ok(());
    }
    Err(AppError::Config(format!(
        "{key} must use https for non-local hosts"
    )))
}

fn is_local_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

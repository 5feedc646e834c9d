//! Error types for HerokuGate
//!
//! Protocol and downstream failures have their own enums so callers can
//! tell them apart. Everything reaching an HTTP handler is converted to
//! `AppError`, which implements `IntoResponse`.
//!
//! None of these carry provider response bodies or credential values, so
//! their `Display` output is safe to log and to return to the browser.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure turning an authorization code into an access token
///
/// Never retried: authorization codes are single-use.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Token endpoint unreachable, timed out, or the connection failed
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// Token endpoint answered with a non-success status
    #[error("token endpoint returned status {0}")]
    Status(u16),

    /// Token endpoint answered 200 with an OAuth error object
    #[error("token request rejected: {0}")]
    Rejected(String),

    /// Body could not be decoded into a token response
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The callback carried no authorization code
    #[error("authorization code missing from callback")]
    MissingCode,
}

impl ExchangeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Transport(_) => "transport",
            ExchangeError::Status(_) => "status",
            ExchangeError::Rejected(_) => "rejected",
            ExchangeError::MalformedResponse(_) => "malformed",
            ExchangeError::MissingCode => "missing_code",
        }
    }
}

/// Failure calling the provider API with a stored token
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("provider API unreachable: {0}")]
    Transport(String),

    #[error("provider API returned status {0}")]
    Status(u16),

    /// Provider refused the bearer token (401/403)
    #[error("provider rejected the access token")]
    Unauthorized,

    #[error("provider API response could not be decoded: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Status(_) => "status",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Decode(_) => "decode",
        }
    }
}

/// Failure reading or writing session state
#[derive(Debug, Error)]
pub enum SessionError {
    /// Cookie missing its signature, badly encoded, or signed with another key
    #[error("invalid session cookie")]
    InvalidCookie,

    /// Stored record failed authentication or could not be decoded
    #[error("corrupt session record")]
    Corrupt,

    /// Session backend failed
    #[error("session backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Backend(err.to_string())
    }
}

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error (500, fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authorization code exchange failed (502)
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    /// Provider API call failed (502, 401 when the token was rejected)
    #[error("Provider API call failed: {0}")]
    Api(#[from] ApiError),

    /// Session storage error (500)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Exchange(err) => (StatusCode::BAD_GATEWAY, err.kind()),
            AppError::Api(ApiError::Unauthorized) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Api(err) => (StatusCode::BAD_GATEWAY, err.kind()),
            AppError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to an HTTP status code and a JSON body of the
    /// form `{"error": ..., "kind": ...}`.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, kind) = self.status_and_kind();
        let error_message = match &self {
            AppError::Exchange(_) => "Sign-in with Heroku failed, please try again".to_string(),
            AppError::Config(_) | AppError::Session(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[kind]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_report_their_cause() {
        assert_eq!(
            AppError::Api(ApiError::Transport("timed out".into())).status_and_kind(),
            (StatusCode::BAD_GATEWAY, "transport")
        );
        assert_eq!(
            AppError::Api(ApiError::Status(500)).status_and_kind(),
            (StatusCode::BAD_GATEWAY, "status")
        );
        assert_eq!(
            AppError::Api(ApiError::Decode("missing email".into())).status_and_kind(),
            (StatusCode::BAD_GATEWAY, "decode")
        );
        assert_eq!(
            AppError::Api(ApiError::Unauthorized).status_and_kind(),
            (StatusCode::UNAUTHORIZED, "unauthorized")
        );
    }

    #[test]
    fn exchange_errors_are_server_errors() {
        let (status, kind) = AppError::Exchange(ExchangeError::Status(401)).status_and_kind();
        assert!(status.is_server_error());
        assert_eq!(kind, "status");
    }
}

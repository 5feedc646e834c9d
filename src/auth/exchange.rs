//! Authorization code exchange
//!
//! One POST to the token endpoint per authorization code. Codes are
//! single-use, so a failed exchange is reported and never retried.

use chrono::{Duration, Utc};
use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::token::{AccessToken, AuthorizationCode};
use crate::config::{OAuthClientConfig, parse_scopes};
use crate::error::ExchangeError;

/// Token endpoint response
///
/// Fields are optional so that an incomplete body is reported as
/// `MalformedResponse` rather than as a JSON error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    user_id: Option<String>,
    /// OAuth error code, sent by some providers with a 200 status
    error: Option<String>,
}

/// Exchanges authorization codes for access tokens
#[derive(Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
}

impl TokenExchanger {
    /// `http` must carry a request timeout.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Exchange `code` at the token endpoint
    ///
    /// # Errors
    /// - `Transport` when the request could not be completed
    /// - `Status` for any non-2xx answer
    /// - `Rejected` for a 2xx answer carrying an OAuth `error`
    /// - `MalformedResponse` when the body is not a usable token response
    pub async fn exchange(
        &self,
        config: &OAuthClientConfig,
        code: &AuthorizationCode,
    ) -> Result<AccessToken, ExchangeError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.secret()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(config.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;
        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            ExchangeError::MalformedResponse(format!(
                "{:?} error at line {} column {}",
                e.classify(),
                e.line(),
                e.column()
            ))
        })?;

        into_access_token(parsed, config)
    }
}

fn into_access_token(
    response: TokenResponse,
    config: &OAuthClientConfig,
) -> Result<AccessToken, ExchangeError> {
    if let Some(error) = response.error {
        return Err(ExchangeError::Rejected(error));
    }

    let access_token = response
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ExchangeError::MalformedResponse("missing access_token".to_string()))?;

    let token_type = response.token_type.unwrap_or_else(|| "Bearer".to_string());
    if !token_type.eq_ignore_ascii_case("bearer") {
        return Err(ExchangeError::MalformedResponse(format!(
            "unsupported token_type {token_type}"
        )));
    }

    let expires_at = match response.expires_in {
        Some(seconds) if seconds < 0 => {
            return Err(ExchangeError::MalformedResponse(
                "negative expires_in".to_string(),
            ));
        }
        Some(seconds) => Some(
            Duration::try_seconds(seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| {
                    ExchangeError::MalformedResponse("expires_in out of range".to_string())
                })?,
        ),
        None => None,
    };

    // An omitted scope means the requested scope was granted.
    let scope = match response.scope.as_deref().map(parse_scopes) {
        Some(granted) if !granted.is_empty() => granted,
        _ => config.scopes.clone(),
    };

    let mut token = AccessToken::new(access_token, token_type);
    token.refresh_token = response.refresh_token.filter(|t| !t.is_empty());
    token.expires_at = expires_at;
    token.scope = scope;
    token.user_id = response.user_id;
    Ok(token)
}

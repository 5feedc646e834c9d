//! Authenticated provider API client
//!
//! Attaches the session's bearer token and the provider's `Accept` header to
//! every call. The token value is never logged.

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;

use super::dto::AccountProjection;
use crate::auth::AccessToken;
use crate::error::{AppError, ApiError};

/// Outbound request relative to the API base
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
        }
    }
}

/// Client for the provider's REST API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    accept: HeaderValue,
}

impl ApiClient {
    /// # Errors
    /// Returns `AppError::Config` if `accept` is not a valid header value
    pub fn new(http: reqwest::Client, base_url: &str, accept: &str) -> Result<Self, AppError> {
        let accept = HeaderValue::from_str(accept)
            .map_err(|e| AppError::Config(format!("provider.api_accept: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            accept,
        })
    }

    /// Perform `request` on behalf of the token's owner and decode the body
    ///
    /// # Errors
    /// - `Transport` when the request could not be completed
    /// - `Unauthorized` when the provider refuses the token (401/403)
    /// - `Status` for any other non-2xx answer
    /// - `Decode` when the body does not have the expected shape
    pub async fn call<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let response = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(token.secret())
            .header(ACCEPT, self.accept.clone())
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "Provider API response"
        );

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.without_url().to_string()))?;
        // Position only; serde messages can quote values from the body.
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::Decode(format!(
                "{:?} error at line {} column {}",
                e.classify(),
                e.line(),
                e.column()
            ))
        })
    }

    /// Fetch the signed-in user's account
    pub async fn account(&self, token: &AccessToken) -> Result<AccountProjection, ApiError> {
        self.call(token, ApiRequest::get("/account")).await
    }
}

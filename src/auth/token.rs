//! Credentials handed out by the identity provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access token issued to one session
///
/// Owned by the session it was issued for. `Debug` never prints the
/// token values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Absent when the provider did not send `expires_in`
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Vec<String>,
    /// Provider account id, when the token response carries one
    pub user_id: Option<String>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: token_type.into(),
            expires_at: None,
            scope: Vec::new(),
            user_id: None,
        }
    }

    /// Bearer credential for outbound API calls
    pub fn secret(&self) -> &str {
        &self.access_token
    }

    /// Check if the provider-reported lifetime has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Single-use code delivered on the callback
///
/// Lives only for the duration of one exchange call.
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationCode(<redacted>)")
    }
}

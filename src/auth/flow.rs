//! Login flow controller
//!
//! ```text
//! Anonymous --start--> AuthorizationRequested
//! AuthorizationRequested --callback(state ok, code)--> Authenticated
//!                        --callback(state mismatch)--> StateMismatch
//!                        --exchange failure-------> ExchangeFailed
//! Authenticated --protected request--> Authenticated
//! ```
//!
//! The HTTP layer only translates requests and outcomes; every protocol
//! decision is made here.

use serde::Deserialize;
use url::Url;

use super::authorize::authorization_url;
use super::exchange::TokenExchanger;
use super::session::SessionId;
use super::state::StateTokenIssuer;
use super::token::{AccessToken, AuthorizationCode};
use crate::api::{AccountProjection, ApiClient};
use crate::config::OAuthClientConfig;
use crate::error::{AppError, ApiError, ExchangeError, SessionError};
use crate::metrics::{API_CALLS_TOTAL, CALLBACKS_TOTAL, LOGIN_STARTS_TOTAL, TOKEN_EXCHANGES_TOTAL};
use crate::store::{SessionTokenStore, TokenLookup};

/// Query parameters from the provider callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// OAuth error code when the user or provider declined
    pub error: Option<String>,
}

/// Redirect issued by `start`
#[derive(Debug)]
pub struct LoginRedirect {
    /// Session the pending state is bound to
    pub session: SessionId,
    pub authorization_url: Url,
}

/// Outcome of a callback that did not fail outright
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Token stored under a freshly minted session id
    Authenticated { session: SessionId },
    /// State did not match; nothing stored, flow must restart
    StateMismatch,
}

pub struct OAuthFlow {
    client: OAuthClientConfig,
    issuer: StateTokenIssuer,
    exchanger: TokenExchanger,
    store: SessionTokenStore,
    api: ApiClient,
}

impl OAuthFlow {
    pub fn new(
        client: OAuthClientConfig,
        exchanger: TokenExchanger,
        store: SessionTokenStore,
        api: ApiClient,
    ) -> Self {
        Self {
            client,
            issuer: StateTokenIssuer::new(),
            exchanger,
            store,
            api,
        }
    }

    /// Begin a login attempt
    ///
    /// Reuses the caller's session if it has one, otherwise mints one. A new
    /// state token replaces any earlier pending one.
    pub async fn start(&self, session: Option<SessionId>) -> Result<LoginRedirect, AppError> {
        let session = session.unwrap_or_else(SessionId::generate);
        let state = self.issuer.issue();
        self.store.put_state(&session, &state).await?;

        LOGIN_STARTS_TOTAL.inc();
        tracing::info!(session = %session.short(), "Login started");

        Ok(LoginRedirect {
            authorization_url: authorization_url(&self.client, &state),
            session,
        })
    }

    /// Complete a login attempt
    ///
    /// The pending state is consumed before anything else, so a callback
    /// can be acted on at most once. Nothing is written to the session
    /// until the exchange has succeeded.
    ///
    /// # Errors
    /// `AppError::Exchange` when the state matched but no token could be
    /// obtained; the caller must restart the flow
    pub async fn callback(
        &self,
        session: Option<&SessionId>,
        params: CallbackParams,
    ) -> Result<CallbackOutcome, AppError> {
        let Some(session) = session else {
            tracing::warn!("OAuth callback without a session");
            CALLBACKS_TOTAL.with_label_values(&["state_mismatch"]).inc();
            return Ok(CallbackOutcome::StateMismatch);
        };

        let expected = match self.store.take_state(session).await {
            Ok(expected) => expected,
            Err(SessionError::Corrupt) => None,
            Err(e) => return Err(e.into()),
        };
        let received = params.state.as_deref().unwrap_or_default();
        let verified = expected
            .as_ref()
            .is_some_and(|expected| self.issuer.verify(expected, received));
        if !verified {
            tracing::warn!(
                session = %session.short(),
                pending = expected.is_some(),
                "OAuth state mismatch"
            );
            CALLBACKS_TOTAL.with_label_values(&["state_mismatch"]).inc();
            return Ok(CallbackOutcome::StateMismatch);
        }

        let token = match self.exchange(session, params).await {
            Ok(token) => token,
            Err(e) => {
                CALLBACKS_TOTAL.with_label_values(&["exchange_failed"]).inc();
                return Err(e.into());
            }
        };

        // Fresh id after privilege change; the pre-login id is dropped.
        let authenticated = SessionId::generate();
        self.store.put(&authenticated, &token).await?;
        if let Err(error) = self.store.invalidate(session).await {
            tracing::warn!(%error, session = %session.short(), "Failed to drop pre-login session");
        }

        CALLBACKS_TOTAL.with_label_values(&["authenticated"]).inc();
        tracing::info!(
            session = %authenticated.short(),
            scope = %token.scope.join(" "),
            "Login completed"
        );

        Ok(CallbackOutcome::Authenticated {
            session: authenticated,
        })
    }

    async fn exchange(
        &self,
        session: &SessionId,
        params: CallbackParams,
    ) -> Result<AccessToken, ExchangeError> {
        if let Some(error) = params.error.as_deref() {
            tracing::warn!(session = %session.short(), provider_error = %error, "Authorization declined");
        }

        let code = params
            .code
            .filter(|code| !code.is_empty() && params.error.is_none())
            .map(AuthorizationCode::new)
            .ok_or(ExchangeError::MissingCode)?;

        match self.exchanger.exchange(&self.client, &code).await {
            Ok(token) => {
                TOKEN_EXCHANGES_TOTAL.with_label_values(&["success"]).inc();
                Ok(token)
            }
            Err(error) => {
                TOKEN_EXCHANGES_TOTAL.with_label_values(&[error.kind()]).inc();
                tracing::error!(%error, session = %session.short(), "Token exchange failed");
                Err(error)
            }
        }
    }

    /// Token usable for protected calls, if the session has one
    ///
    /// Absent, expired and unreadable tokens all mean "not authenticated";
    /// the latter two are removed.
    pub async fn current_token(
        &self,
        session: Option<&SessionId>,
    ) -> Result<Option<AccessToken>, AppError> {
        let Some(session) = session else {
            return Ok(None);
        };

        match self.store.get(session).await {
            Ok(TokenLookup::Present(token)) => Ok(Some(token)),
            Ok(TokenLookup::Absent) => Ok(None),
            Ok(TokenLookup::Expired(_)) => {
                tracing::info!(session = %session.short(), "Access token expired");
                self.store.invalidate(session).await?;
                Ok(None)
            }
            Err(SessionError::Corrupt) => {
                tracing::warn!(session = %session.short(), "Discarding unreadable session record");
                self.store.invalidate(session).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the account of the session's user
    ///
    /// A token the provider refuses is invalidated; other failures leave it
    /// in place.
    pub async fn account(
        &self,
        session: &SessionId,
        token: &AccessToken,
    ) -> Result<AccountProjection, AppError> {
        match self.api.account(token).await {
            Ok(account) => {
                API_CALLS_TOTAL.with_label_values(&["success"]).inc();
                Ok(account)
            }
            Err(error) => {
                API_CALLS_TOTAL.with_label_values(&[error.kind()]).inc();
                tracing::warn!(%error, session = %session.short(), "Provider API call failed");
                if matches!(error, ApiError::Unauthorized) {
                    self.store.invalidate(session).await?;
                }
                Err(error.into())
            }
        }
    }

    /// End the session
    pub async fn logout(&self, session: &SessionId) -> Result<(), AppError> {
        self.store.invalidate(session).await?;
        tracing::info!(session = %session.short(), "Logged out");
        Ok(())
    }
}

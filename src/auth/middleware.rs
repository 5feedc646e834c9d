//! Authentication middleware
//!
//! Protects routes that call the provider on the user's behalf.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::session::SessionId;
use super::token::AccessToken;
use super::{LOGIN_START_PATH, found};
use crate::AppState;

fn session_from_headers(headers: &HeaderMap, state: &AppState) -> Option<SessionId> {
    let jar = CookieJar::from_headers(headers);
    match state.cookies.read(&jar) {
        Ok(session) => session,
        Err(error) => {
            tracing::debug!(%error, "Ignoring session cookie");
            None
        }
    }
}

/// Session id from the request cookie, if it carries a valid one
///
/// A tampered or malformed cookie is treated as no session.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<SessionId>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(MaybeSession(session_from_headers(&parts.headers, &app_state)))
    }
}

/// Session and token of an authenticated request
///
/// Inserted into request extensions by [`require_token`].
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session: SessionId,
    pub token: AccessToken,
}

/// Middleware to require a stored access token
///
/// Re-reads the token from the session store on every request. Requests
/// without one are redirected to the start of the login flow before any
/// provider call is made.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/account", get(account))
///     .route_layer(middleware::from_fn_with_state(state, require_token));
/// ```
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = session_from_headers(request.headers(), &state);

    match state.flow.current_token(session.as_ref()).await {
        Ok(Some(token)) => {
            let Some(session) = session else {
                return found(LOGIN_START_PATH);
            };
            request
                .extensions_mut()
                .insert(Authenticated { session, token });
            next.run(request).await
        }
        Ok(None) => found(LOGIN_START_PATH),
        Err(error) => error.into_response(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Response;

    /// Extract the authenticated session
    ///
    /// Only succeeds behind [`require_token`].
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or_else(|| found(LOGIN_START_PATH))
    }
}

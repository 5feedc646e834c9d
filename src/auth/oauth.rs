//! Heroku OAuth routes
//!
//! Thin HTTP boundary over [`OAuthFlow`](super::OAuthFlow): reads cookies and
//! query parameters, writes cookies and redirects.

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;

use super::flow::{CallbackOutcome, CallbackParams};
use super::middleware::MaybeSession;
use super::{HOME_PATH, LOGIN_START_PATH, found};
use crate::AppState;
use crate::config::CALLBACK_PATH;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET / - Index page
/// - GET /login/start - Redirect to Heroku
/// - GET /login/callback - OAuth callback
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_page))
        .route(LOGIN_START_PATH, get(login_start))
        .route(CALLBACK_PATH, get(login_callback))
        .route("/logout", post(logout))
}

// =============================================================================
// Index Page
// =============================================================================

/// GET /
async fn index_page() -> impl IntoResponse {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>HerokuGate</title></head>
        <body>
            <h1>HerokuGate</h1>
            <p>Please sign in with Heroku</p>
            <a href="/login/start">Sign in with Heroku</a>
        </body>
        </html>
    "#,
    )
}

// =============================================================================
// Heroku OAuth
// =============================================================================

/// GET /login/start
///
/// Redirects the user to the Heroku authorization page.
///
/// # Steps
/// 1. Generate CSRF state token and bind it to the session
/// 2. Set the session cookie
/// 3. Redirect to Heroku with client_id, redirect_uri, scope, state
async fn login_start(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let login = state.flow.start(session).await?;
    let jar = jar.add(state.cookies.cookie(&login.session));
    Ok((jar, found(login.authorization_url.as_str())))
}

/// GET /login/callback
///
/// Handles the OAuth callback from Heroku.
///
/// A query that does not parse (a repeated `state`, for one) is handled as
/// a callback without state: the pending state is consumed and the flow
/// restarts.
///
/// # Steps
/// 1. Verify CSRF state; on mismatch restart the flow
/// 2. Exchange code for access token; on failure answer 502
/// 3. Store the token under a new session id and set its cookie
/// 4. Redirect to home
async fn login_callback(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    query: Result<Query<CallbackParams>, QueryRejection>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Unreadable OAuth callback query");
            CallbackParams::default()
        }
    };

    match state.flow.callback(session.as_ref(), params).await? {
        CallbackOutcome::Authenticated { session } => {
            let jar = jar.add(state.cookies.cookie(&session));
            Ok((jar, found(HOME_PATH)))
        }
        CallbackOutcome::StateMismatch => Ok((jar, found(LOGIN_START_PATH))),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Invalidates the stored token, clears the session cookie and redirects to
/// the index page.
async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    if let Some(session) = session {
        state.flow.logout(&session).await?;
    }
    Ok((jar.add(state.cookies.removal()), found("/")))
}

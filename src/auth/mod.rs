//! Heroku OAuth authentication
//!
//! Handles:
//! - State token issue and verification
//! - Authorization redirect and code exchange
//! - Session identity
//! - Authentication middleware

mod authorize;
mod exchange;
mod flow;
mod middleware;
mod oauth;
pub mod session;
mod state;
mod token;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub use authorize::authorization_url;
pub use exchange::TokenExchanger;
pub use flow::{CallbackOutcome, CallbackParams, LoginRedirect, OAuthFlow};
pub use middleware::{Authenticated, MaybeSession, require_token};
pub use oauth::auth_router;
pub use session::{SessionCookies, SessionId, SessionKeys};
pub use state::{StateToken, StateTokenIssuer};
pub use token::{AccessToken, AuthorizationCode};

/// Entry point of the login flow
pub const LOGIN_START_PATH: &str = "/login/start";

/// Landing page after a successful login
pub const HOME_PATH: &str = "/home";

/// `302 Found` redirect to `location`
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

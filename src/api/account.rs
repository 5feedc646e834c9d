//! Protected pages backed by the provider API

use axum::{
    Json, Router, middleware,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use super::dto::AccountProjection;
use crate::AppState;
use crate::auth::{Authenticated, HOME_PATH, require_token};
use crate::error::AppError;

/// Create the router for pages that need a stored token
///
/// Every route sits behind [`require_token`]; anonymous requests are
/// redirected to the start of the login flow.
pub fn account_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(HOME_PATH, get(home_page))
        .route("/account", get(account))
        .route_layer(middleware::from_fn_with_state(state, require_token))
}

/// GET /home
async fn home_page(_auth: Authenticated) -> impl IntoResponse {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Home - HerokuGate</title></head>
        <body>
            <h1>Signed in with Heroku</h1>
            <ul>
                <li><a href="/account">Account information</a></li>
            </ul>
            <form method="post" action="/logout"><button type="submit">Sign out</button></form>
        </body>
        </html>
    "#,
    )
}

/// GET /account
///
/// Returns the signed-in user's Heroku account projection.
async fn account(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<AccountProjection>, AppError> {
    let account = state.flow.account(&auth.session, &auth.token).await?;
    Ok(Json(account))
}

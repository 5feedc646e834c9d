//! Authorization endpoint redirect

use url::Url;

use super::state::StateToken;
use crate::config::OAuthClientConfig;

/// Build the provider authorization URL for one login attempt
///
/// Pure function of its inputs; every parameter is form-urlencoded.
pub fn authorization_url(config: &OAuthClientConfig, state: &StateToken) -> Url {
    let mut url = config.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("state", state.as_str());
    url
}

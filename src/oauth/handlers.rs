//! OAuth HTTP handlers: authorization start and callback completion.

use std::sync::Arc;

use axum::{Json, extract::State, response::Response};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::gateway::cookies::{self, AuthType};
use crate::gateway::router::AppState;
use crate::oauth::callback::parse_callback_url;
use crate::session::Session;
use crate::{Error, Result};

/// Body of an authorization-start request.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Where the provider should send the user back; must be allowlisted
    pub redirect_uri: String,
    /// PKCE challenge, forwarded verbatim
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE challenge method, forwarded verbatim
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// Authorization-start response: the provider URL to navigate to.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Provider authorization URL, CSRF state included
    pub url: String,
}

/// Body of a callback-completion request.
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    /// Full callback URL the provider redirected the user to
    pub url: String,
    /// PKCE verifier matching the challenge from the start step
    #[serde(default)]
    pub code_verifier: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
    user_id: String,
    user_email: String,
    name: Option<String>,
    is_admin: bool,
}

/// Start an OAuth authorization: validate the redirect URI against the
/// allowlist, then have the auth backend mint the provider URL.
///
/// The allowlist check runs before any backend call so a hostile
/// redirect URI never leaves the gateway.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>> {
    if !state.policy.redirect_allowlist.contains(&body.redirect_uri) {
        return Err(Error::InvalidRequest(format!(
            "Invalid redirect_uri: {}",
            body.redirect_uri
        )));
    }

    debug!(redirect_uri = %body.redirect_uri, "Starting OAuth authorization");
    let response = state
        .auth_backend
        .auth_url(
            &body.redirect_uri,
            body.code_challenge.as_deref(),
            body.code_challenge_method.as_deref(),
        )
        .await?;

    Ok(Json(AuthorizeResponse { url: response.url }))
}

/// Complete an OAuth login: parse the provider callback, exchange the
/// code for an identity token, mint a session and set the auth cookies.
///
/// The response body's `access_token` is the opaque session id, never
/// the backend JWT; the JWT only ever exists sealed inside the store.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CallbackRequest>,
) -> Result<Response> {
    let params = parse_callback_url(&body.url)?;

    let exchange = state
        .auth_backend
        .exchange_code(
            params.code.as_deref(),
            &params.state,
            params.error.as_deref(),
            body.code_verifier.as_deref(),
        )
        .await?;

    let sealed = state.codec.encrypt(&exchange.access_token)?;
    let session = Session::new(
        exchange.user.id.clone(),
        exchange.user.library_id.clone().unwrap_or_default(),
        sealed,
    );
    let session_token = session.id.to_string();
    state.sessions.insert(session).await?;

    info!(user = %exchange.user.id, "OAuth login completed");

    let mut response = Json(LoginResponse {
        access_token: session_token.clone(),
        user_id: exchange.user.id,
        user_email: exchange.user.email,
        name: exchange.user.name,
        is_admin: false,
    })
    .into_response();

    for cookie in cookies::auth_cookies(&session_token, AuthType::OAuth, state.policy.secure_cookies)
    {
        cookies::append_set_cookie(&mut response, &cookie);
    }

    Ok(response)
}

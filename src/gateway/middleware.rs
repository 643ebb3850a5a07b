//! Authentication middleware.
//!
//! Every request under the API prefix passes through here. The client's
//! credential (an opaque session token) is resolved to a live session,
//! the stored backend JWT is unsealed, and both travel to the handler in
//! an [`AuthContext`] request extension. After the handler returns, any
//! refreshed token recorded by the origin client is persisted and the
//! transport header it arrived in is stripped from the response.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::gateway::cookies::{self, SESSION_COOKIE};
use crate::gateway::refresh::{self, REFRESH_HEADER, RefreshChannel};
use crate::gateway::router::AppState;
use crate::{Error, Result};

/// Native header carrying the session token (mobile clients).
pub const USER_TOKEN_HEADER: &str = "x-immich-user-token";

/// How the client presented its credential. Drives response-shaping:
/// only web clients get their session cookie re-set on refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Credential came from the session cookie
    Web,
    /// Credential came from a header (`Authorization` or native)
    Mobile,
    /// No credential presented
    Unknown,
}

/// Authenticated request context, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Opaque session token the client presented
    pub session_token: Option<String>,
    /// Credential source classification
    pub client_kind: ClientKind,
    /// Decrypted backend identity token, when authenticated
    pub jwt: Option<String>,
}

impl AuthContext {
    fn anonymous() -> Self {
        Self {
            session_token: None,
            client_kind: ClientKind::Unknown,
            jwt: None,
        }
    }
}

/// Extract the session token from a request, in precedence order:
/// `Authorization: Bearer` first, then the native header, then the
/// session cookie. Earlier sources shadow later ones even when the
/// later value would have been valid.
#[must_use]
pub fn resolve_credentials(headers: &HeaderMap) -> (Option<String>, ClientKind) {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        // Scheme match is case-insensitive per RFC 9110
        if value.len() > 7 && value[..7].eq_ignore_ascii_case("bearer ") {
            let token = value[7..].trim();
            if !token.is_empty() {
                return (Some(token.to_string()), ClientKind::Mobile);
            }
        }
    }

    if let Some(value) = headers
        .get(USER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return (Some(value.to_string()), ClientKind::Mobile);
    }

    if let Some(value) = cookies::request_cookie(headers, SESSION_COOKIE).filter(|v| !v.is_empty())
    {
        return (Some(value), ClientKind::Web);
    }

    (None, ClientKind::Unknown)
}

/// Axum middleware resolving authentication under the API prefix.
///
/// Unauthenticated-path bypass is decided on the exact path before any
/// credential or store work, so the login and OAuth endpoints stay
/// reachable even when the session store is down.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let path = request.uri().path().to_string();

    if !state.policy.is_api_path(&path) || state.policy.is_unauthenticated_path(&path) {
        request.extensions_mut().insert(AuthContext::anonymous());
        let mut response = next.run(request).await;
        // The refresh header is transport between gateway and origin,
        // never part of the client contract.
        response.headers_mut().remove(REFRESH_HEADER);
        return Ok(response);
    }

    let (session_token, client_kind) = resolve_credentials(request.headers());

    // A missing credential is not an error here: handlers that require
    // identity reject an anonymous context themselves. A credential that
    // is present but does not resolve always is.
    let context = if let Some(token) = &session_token {
        let session = state
            .sessions
            .get_by_id(token)
            .await?
            .ok_or(Error::Unauthorized)?;
        let jwt = state.codec.decrypt(&session.stored_jwt)?;
        AuthContext {
            session_token: session_token.clone(),
            client_kind,
            jwt: Some(jwt),
        }
    } else {
        AuthContext::anonymous()
    };
    request.extensions_mut().insert(context);

    let channel = RefreshChannel::new();
    let mut response = refresh::with_channel(channel.clone(), next.run(request)).await;

    if let Some(new_jwt) = channel.take() {
        // Without a resolved session there is nothing to persist or
        // re-cookie; the header strip below still applies.
        if let Some(token) = &session_token {
            debug!(session = %token, "Persisting refreshed identity token");
            match state.sessions.update_stored_jwt(token, &new_jwt).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(session = %token, "Session vanished before refresh persisted");
                }
                Err(e) => {
                    // The handler already produced a valid response; a
                    // failed persist costs one extra refresh next
                    // request at worst.
                    warn!(session = %token, error = %e, "Failed to persist refreshed token");
                }
            }
            if client_kind == ClientKind::Web {
                // Re-set the cookie with the unchanged session token to
                // slide its lifetime, whether or not the persist landed.
                // The token value never changes on refresh.
                let cookie = cookies::session_cookie(token, state.policy.secure_cookies);
                cookies::append_set_cookie(&mut response, &cookie);
            }
        }
    }

    response.headers_mut().remove(REFRESH_HEADER);
    channel.clear();
    Ok(response)
}

//! HTTP router and shared application state

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use super::middleware::auth_middleware;
use crate::backend::AuthBackend;
use crate::config::Config;
use crate::oauth::handlers;
use crate::oauth::redirect::RedirectAllowlist;
use crate::session::{JwtCodec, SessionStore};

/// Request-path policy derived from configuration at startup.
pub struct AuthPolicy {
    /// Prefix under which authentication is enforced
    pub api_prefix: String,
    /// Exact paths that bypass authentication
    pub unauthenticated_paths: Vec<String>,
    /// Normalized allowlist for OAuth redirect URIs
    pub redirect_allowlist: RedirectAllowlist,
    /// Whether auth cookies carry the `Secure` flag
    pub secure_cookies: bool,
}

impl AuthPolicy {
    /// Resolve the policy from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_prefix: config.auth.api_prefix.clone(),
            unauthenticated_paths: config.auth.unauthenticated_paths.clone(),
            redirect_allowlist: RedirectAllowlist::new(&config.oauth.allowed_redirect_uris),
            secure_cookies: config.auth.secure_cookies,
        }
    }

    /// Whether `path` bypasses authentication. Exact match only; no
    /// prefix or glob semantics.
    #[must_use]
    pub fn is_unauthenticated_path(&self, path: &str) -> bool {
        self.unauthenticated_paths.iter().any(|p| p == path)
    }

    /// Whether `path` falls under the authenticated API prefix. Matches
    /// on a segment boundary: `/apifoo` is not under `/api`.
    #[must_use]
    pub fn is_api_path(&self, path: &str) -> bool {
        path == self.api_prefix
            || path
                .strip_prefix(&self.api_prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Shared application state
pub struct AppState {
    /// Session store
    pub sessions: Arc<dyn SessionStore>,
    /// Codec sealing stored identity tokens
    pub codec: Arc<dyn JwtCodec>,
    /// Auth backend for OAuth URL minting and code exchange
    pub auth_backend: Arc<dyn AuthBackend>,
    /// Request-path and cookie policy
    pub policy: AuthPolicy,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/oauth/authorize", post(handlers::authorize))
        .route("/api/oauth/callback", post(handlers::callback))
        // Authentication middleware (applied before other layers)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness probe
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AuthPolicy {
        AuthPolicy::from_config(&Config::default())
    }

    #[test]
    fn unauthenticated_paths_match_exactly() {
        let policy = policy();
        assert!(policy.is_unauthenticated_path("/api/oauth/callback"));
        assert!(policy.is_unauthenticated_path("/api/auth/login"));
        assert!(!policy.is_unauthenticated_path("/api/oauth/callback/extra"));
        assert!(!policy.is_unauthenticated_path("/api/oauth"));
    }

    #[test]
    fn api_prefix_matches_on_segment_boundary() {
        let policy = policy();
        assert!(policy.is_api_path("/api"));
        assert!(policy.is_api_path("/api/albums"));
        assert!(!policy.is_api_path("/apifoo"));
        assert!(!policy.is_api_path("/apifoo/albums"));
        assert!(!policy.is_api_path("/public"));
    }

    #[test]
    fn default_policy_covers_the_contract() {
        let policy = policy();
        assert_eq!(policy.api_prefix, "/api");
        assert!(policy.secure_cookies);
        assert!(policy.redirect_allowlist.is_empty());
    }
}

//! Pooled HTTP clients for the origin service.
//!
//! Each downstream dependency gets one process-wide, connection-pooled
//! client, built lazily under double-checked locking: an optimistic read
//! on the hot path, then a write lock with a re-check before
//! construction, so concurrent first use never builds two pools.
//! Shutdown is explicit and idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::BackendConfig;
use crate::gateway::refresh::{self, REFRESH_HEADER};
use crate::{Error, Result};

/// Lazily initialized holder for a shared client.
pub struct ClientSlot<T> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> ClientSlot<T> {
    /// Create an empty slot (usable in statics).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Return the shared instance, constructing it exactly once.
    ///
    /// Optimistic read first; on miss, the write lock is taken and the
    /// slot re-checked so a racing initializer's instance is reused.
    pub fn get_or_try_init(&self, init: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        if let Some(existing) = self.inner.read().as_ref() {
            return Ok(Arc::clone(existing));
        }

        let mut slot = self.inner.write();
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let built = Arc::new(init()?);
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Drop the held instance. Returns whether one was held; closing an
    /// unconstructed or already-closed slot is a no-op.
    pub fn shutdown(&self) -> bool {
        self.inner.write().take().is_some()
    }

    /// Whether the slot currently holds an instance.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl<T> Default for ClientSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

static ORIGIN_CLIENT: ClientSlot<OriginClient> = ClientSlot::new();
static AUTH_CLIENT: ClientSlot<HttpAuthBackend> = ClientSlot::new();

/// Shared origin-service client, built on first use.
pub fn origin_client(config: &BackendConfig) -> Result<Arc<OriginClient>> {
    ORIGIN_CLIENT.get_or_try_init(|| OriginClient::new(config))
}

/// Shared auth-backend client, built on first use.
pub fn auth_backend(config: &BackendConfig) -> Result<Arc<HttpAuthBackend>> {
    AUTH_CLIENT.get_or_try_init(|| HttpAuthBackend::new(config))
}

/// Release all shared clients. Safe to call repeatedly.
pub fn shutdown_clients() {
    if ORIGIN_CLIENT.shutdown() {
        debug!("Origin client released");
    }
    if AUTH_CLIENT.shutdown() {
        debug!("Auth backend client released");
    }
}

/// Build a pooled HTTP client with the configured fixed parameters.
fn build_http_client(config: &BackendConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(config.max_connections)
        .pool_idle_timeout(Duration::from_secs(config.keepalive_secs))
        .tcp_keepalive(Duration::from_secs(30))
        .tcp_nodelay(true)
        .build()
        .map_err(Error::Http)
}

fn parse_base_url(config: &BackendConfig) -> Result<Url> {
    Url::parse(&config.base_url)
        .map_err(|e| Error::Config(format!("Invalid backend base_url: {e}")))
}

/// Observe an origin-service response for a refreshed identity token and
/// route it into the current request's refresh channel.
pub fn observe_response(headers: &reqwest::header::HeaderMap) {
    if let Some(token) = headers.get(REFRESH_HEADER).and_then(|v| v.to_str().ok()) {
        debug!("Origin service issued a refreshed identity token");
        refresh::record(token);
    }
}

/// Client for authenticated calls to the origin service.
///
/// Every response passes through [`observe_response`], so a refresh
/// issued mid-request reaches the auth middleware regardless of what the
/// handler returns.
#[derive(Debug)]
pub struct OriginClient {
    http: Client,
    base_url: Url,
}

impl OriginClient {
    /// Build a client from pool configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: parse_base_url(config)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Internal(format!("Invalid origin path {path}: {e}")))
    }

    /// GET a JSON resource on behalf of the authenticated user.
    pub async fn get_json(&self, path: &str, jwt: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(jwt)
            .send()
            .await?;
        observe_response(response.headers());
        Ok(response.error_for_status()?.json().await?)
    }

    /// POST a JSON body on behalf of the authenticated user.
    pub async fn post_json(&self, path: &str, jwt: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .bearer_auth(jwt)
            .json(body)
            .send()
            .await?;
        observe_response(response.headers());
        Ok(response.error_for_status()?.json().await?)
    }
}

/// Provider authorization URL minted by the auth backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUrlResponse {
    /// Fully formed provider authorization URL (carries the CSRF state)
    pub url: String,
}

/// Outcome of exchanging an authorization code for an identity token.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResult {
    /// Backend identity token (JWT)
    pub access_token: String,
    /// Authenticated user
    pub user: ExchangeUser,
}

/// User identity returned by the exchange endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeUser {
    /// User id, opaque to the gateway
    pub id: String,
    /// Account email
    pub email: String,
    /// Display name, when the provider supplies one
    #[serde(default)]
    pub name: Option<String>,
    /// Default library scope for the user
    #[serde(default)]
    pub library_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

/// Auth backend operations used by the OAuth handlers.
///
/// Trait seam so tests can run the flow without a live backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Ask the backend to mint a CSRF state and provider authorization URL.
    async fn auth_url(
        &self,
        redirect_uri: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
    ) -> Result<AuthUrlResponse>;

    /// Exchange callback parameters for an identity token. `code` and
    /// `error` are forwarded as received; the backend decides precedence.
    async fn exchange_code(
        &self,
        code: Option<&str>,
        state: &str,
        error: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<ExchangeResult>;
}

/// HTTP implementation of [`AuthBackend`] against the origin auth service.
pub struct HttpAuthBackend {
    http: Client,
    base_url: Url,
}

impl HttpAuthBackend {
    /// Build a client from pool configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: parse_base_url(config)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Internal(format!("Invalid auth path {path}: {e}")))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn auth_url(
        &self,
        redirect_uri: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
    ) -> Result<AuthUrlResponse> {
        let mut params = vec![("redirect_uri", redirect_uri)];
        if let Some(challenge) = code_challenge {
            params.push(("code_challenge", challenge));
        }
        if let Some(method) = code_challenge_method {
            params.push(("code_challenge_method", method));
        }

        let response = self
            .http
            .get(self.endpoint("/api/oauth/auth-url")?)
            .query(&params)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Backend(format!("auth-url request failed: {e}")))?;

        Ok(response.json().await?)
    }

    async fn exchange_code(
        &self,
        code: Option<&str>,
        state: &str,
        error: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<ExchangeResult> {
        let body = ExchangeRequest {
            code,
            state,
            error,
            code_verifier,
        };

        let response = self
            .http
            .post(self.endpoint("/api/oauth/exchange")?)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Backend(format!("token exchange failed: {e}")))?;

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::refresh::RefreshChannel;
    use pretty_assertions::assert_eq;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn slot_initializes_exactly_once() {
        let slot: ClientSlot<u32> = ClientSlot::new();
        assert!(!slot.is_initialized());
        let a = slot.get_or_try_init(|| Ok(7)).unwrap();
        let b = slot.get_or_try_init(|| panic!("must not construct twice")).unwrap();
        assert_eq!(*a, 7);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn slot_failed_init_leaves_slot_empty() {
        let slot: ClientSlot<u32> = ClientSlot::new();
        let err = slot.get_or_try_init(|| Err(Error::Config("nope".into())));
        assert!(err.is_err());
        assert!(!slot.is_initialized());
        assert_eq!(*slot.get_or_try_init(|| Ok(9)).unwrap(), 9);
    }

    #[test]
    fn slot_shutdown_is_idempotent() {
        let slot: ClientSlot<u32> = ClientSlot::new();
        assert!(!slot.shutdown(), "unconstructed shutdown is a no-op");
        let _ = slot.get_or_try_init(|| Ok(1)).unwrap();
        assert!(slot.shutdown());
        assert!(!slot.shutdown(), "second shutdown is a no-op");
        assert!(!slot.is_initialized());
    }

    #[test]
    fn concurrent_first_use_constructs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let slot: Arc<ClientSlot<u64>> = Arc::new(ClientSlot::new());
        let constructions = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let constructions = Arc::clone(&constructions);
                std::thread::spawn(move || {
                    slot.get_or_try_init(|| {
                        constructions.fetch_add(1, Ordering::SeqCst);
                        Ok(42)
                    })
                    .map(|v| *v)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 42);
        }
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn origin_endpoint_joins_against_the_base_url() {
        let client = OriginClient::new(&BackendConfig::default()).unwrap();
        assert_eq!(
            client.endpoint("/api/albums").unwrap().as_str(),
            "http://localhost:8000/api/albums"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let config = BackendConfig {
            base_url: "not a url".to_string(),
            ..BackendConfig::default()
        };
        let err = OriginClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid backend base_url"));
    }

    #[tokio::test]
    async fn observe_response_records_refresh_header() {
        let channel = RefreshChannel::new();
        refresh::with_channel(channel.clone(), async {
            let mut headers = HeaderMap::new();
            headers.insert(REFRESH_HEADER, HeaderValue::from_static("new-token-123"));
            observe_response(&headers);
        })
        .await;
        assert_eq!(channel.take(), Some("new-token-123".to_string()));
    }

    #[tokio::test]
    async fn observe_response_without_header_records_nothing() {
        let channel = RefreshChannel::new();
        refresh::with_channel(channel.clone(), async {
            let mut headers = HeaderMap::new();
            headers.insert("content-type", HeaderValue::from_static("application/json"));
            observe_response(&headers);
        })
        .await;
        assert_eq!(channel.take(), None);
    }

    #[test]
    fn exchange_request_omits_absent_fields() {
        let body = ExchangeRequest {
            code: Some("abc"),
            state: "xyz",
            error: None,
            code_verifier: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"code": "abc", "state": "xyz"}));
    }
}

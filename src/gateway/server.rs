//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::router::{AppState, AuthPolicy, create_router};
use crate::backend;
use crate::config::Config;
use crate::session::{JwtCodec, MemorySessionStore, SealingCodec};
use crate::{Error, Result};

/// Auth gateway server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Shared handler state
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a new gateway
    ///
    /// Resolves the session encryption key, builds the token codec and
    /// session store, and attaches the shared auth-backend client.
    pub fn new(config: Config) -> Result<Self> {
        let key = config.session.resolve_encryption_key()?;
        let codec: Arc<dyn JwtCodec> = Arc::new(SealingCodec::new(&key));
        let sessions = Arc::new(MemorySessionStore::new(Arc::clone(&codec)));
        let auth_backend = backend::auth_backend(&config.backend)?;

        let state = Arc::new(AppState {
            sessions,
            codec,
            auth_backend,
            policy: AuthPolicy::from_config(&config),
        });

        Ok(Self { config, state })
    }

    /// Run the gateway
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            api_prefix = %self.config.auth.api_prefix,
            allowed_redirects = self.config.oauth.allowed_redirect_uris.len(),
            "Listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Releasing pooled clients");
        backend::shutdown_clients();

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

//! Configuration management

use std::{env, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Authentication pipeline configuration
    pub auth: AuthConfig,
    /// OAuth redirect security configuration
    pub oauth: OAuthConfig,
    /// Origin backend configuration
    pub backend: BackendConfig,
    /// Session storage configuration
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Authentication pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Prefix under which requests require authentication; everything
    /// outside it (static assets, SPA routes) bypasses the pipeline
    pub api_prefix: String,

    /// Exact request paths that bypass authentication entirely
    #[serde(default = "default_unauthenticated_paths")]
    pub unauthenticated_paths: Vec<String>,

    /// Whether auth cookies carry the `Secure` flag. Disable only for
    /// plain-HTTP local development.
    pub secure_cookies: bool,
}

fn default_unauthenticated_paths() -> Vec<String> {
    vec![
        "/api/oauth/authorize".to_string(),
        "/api/oauth/callback".to_string(),
        "/api/auth/login".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            unauthenticated_paths: default_unauthenticated_paths(),
            secure_cookies: true,
        }
    }
}

/// OAuth redirect security configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OAuthConfig {
    /// Redirect URIs permitted for authorization starts. Compared in
    /// normalized form; an empty list rejects every authorize request.
    pub allowed_redirect_uris: Vec<String>,
}

/// Origin backend configuration (pool parameters are fixed config, not
/// runtime-negotiated)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the origin service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum pooled connections per host
    pub max_connections: usize,
    /// Idle keep-alive duration in seconds
    pub keepalive_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            max_connections: 100,
            keepalive_secs: 90,
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Key material for sealing stored JWTs.
    /// Supports a literal value or `env:VAR_NAME` indirection.
    pub encryption_key: Option<String>,
}

impl SessionConfig {
    /// Resolve the encryption key, expanding `env:VAR_NAME` indirection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no key is configured or the named
    /// environment variable is unset.
    pub fn resolve_encryption_key(&self) -> Result<String> {
        let raw = self.encryption_key.as_deref().ok_or_else(|| {
            Error::Config("session.encryption_key is required but not set".to_string())
        })?;
        if let Some(var_name) = raw.strip_prefix("env:") {
            env::var(var_name).map_err(|_| {
                Error::Config(format!(
                    "session.encryption_key references unset variable {var_name}"
                ))
            })
        } else {
            Ok(raw.to_string())
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (GUMNUT_GATEWAY_ prefix)
        figment = figment.merge(Env::prefixed("GUMNUT_GATEWAY_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}

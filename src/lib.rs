//! Gumnut Gateway Library
//!
//! Session-backed authentication gateway in front of the Gumnut origin
//! API.
//!
//! # Features
//!
//! - **Credential resolution**: `Authorization: Bearer`, native header
//!   and session cookie, in fixed precedence order
//! - **Opaque sessions**: clients hold an unguessable session token;
//!   the backend JWT only ever exists sealed inside the session store
//! - **Transparent refresh**: backend-issued token refreshes are
//!   persisted mid-request and never leak to clients
//! - **OAuth login**: redirect-URI allowlisting, callback parsing and
//!   code exchange against the auth backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod oauth;
pub mod session;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

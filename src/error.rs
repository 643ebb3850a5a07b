//! Error types for the Gumnut gateway

use std::io;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::session::{CodecError, StoreError};

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
///
/// The HTTP mapping follows a strict leak-prevention policy: only
/// [`Error::InvalidRequest`] surfaces its message to the client. Session
/// misses map to a fixed 401 body, and every server-side fault (store,
/// codec, auth backend) maps to a fixed generic 500 body.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-supplied input failed validation (bad redirect URI,
    /// malformed OAuth callback, ...)
    #[error("{0}")]
    InvalidRequest(String),

    /// Credential was presented but does not resolve to a live session
    #[error("Invalid user token")]
    Unauthorized,

    /// Session store fault (connectivity, corrupted record)
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Stored token could not be decrypted (key or data corruption)
    #[error("Token codec error: {0}")]
    Codec(#[from] CodecError),

    /// Auth backend call failed
    #[error("Auth backend error: {0}")]
    Backend(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error maps to
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to the client.
    ///
    /// Internal faults never echo the underlying error text.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self {
            Self::InvalidRequest(msg) => msg,
            Self::Unauthorized => "Invalid user token",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_exposes_specific_message() {
        let err = Error::InvalidRequest("Invalid redirect_uri: https://evil.example/x".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("Invalid redirect_uri"));
    }

    #[test]
    fn unauthorized_uses_fixed_message() {
        let err = Error::Unauthorized;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Invalid user token");
    }

    #[test]
    fn internal_faults_never_leak_detail() {
        let err = Error::Store(StoreError::Unavailable("redis connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");

        let err = Error::Codec(CodecError::InvalidCiphertext);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");

        let err = Error::Backend("exchange returned 502".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}

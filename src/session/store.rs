//! Session records and the keyed session store contract.
//!
//! A [`Session`] binds an opaque client-visible token (its `id`) to an
//! encrypted backend identity token (`stored_jwt`). The auth core only
//! ever mutates `stored_jwt`, and only through
//! [`SessionStore::update_stored_jwt`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use super::crypto::JwtCodec;

/// Session store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or the call failed
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// A stored record is missing fields or otherwise malformed
    #[error("session data error: {0}")]
    Data(String),
}

/// One authenticated client binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque unguessable token; the value clients present as their
    /// session token. Immutable for the session's lifetime.
    pub id: Uuid,
    /// Identity reference, opaque to the auth core
    pub user_id: String,
    /// Scope reference, opaque to the auth core
    pub library_id: String,
    /// Ciphertext of the backend identity token
    pub stored_jwt: String,
    /// Descriptive client metadata
    pub device_type: String,
    /// Descriptive client metadata
    pub device_os: String,
    /// Descriptive client metadata
    pub app_version: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Advances on every `stored_jwt` replacement
    pub updated_at: DateTime<Utc>,
    /// Flag for downstream sync logic; not interpreted here
    pub is_pending_sync_reset: bool,
}

impl Session {
    /// Mint a fresh session with a random id and current timestamps.
    #[must_use]
    pub fn new(user_id: impl Into<String>, library_id: impl Into<String>, stored_jwt: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            library_id: library_id.into(),
            stored_jwt,
            device_type: String::new(),
            device_os: String::new(),
            app_version: String::new(),
            created_at: now,
            updated_at: now,
            is_pending_sync_reset: false,
        }
    }

    /// Attach client metadata (User-Agent derived, not load-bearing).
    #[must_use]
    pub fn with_device(
        mut self,
        device_type: impl Into<String>,
        device_os: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        self.device_type = device_type.into();
        self.device_os = device_os.into();
        self.app_version = app_version.into();
        self
    }
}

/// Keyed session storage contract.
///
/// Safe to call concurrently for distinct session ids. Calls are treated
/// as independent: the auth core performs no retries on failure.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by its opaque id. `Ok(None)` is a miss, not a fault.
    async fn get_by_id(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Replace the stored (encrypted) JWT for a session, advancing
    /// `updated_at`. Returns `false` if the session no longer exists.
    /// Re-encryption of `new_jwt` is the store's responsibility.
    async fn update_stored_jwt(&self, session_id: &str, new_jwt: &str) -> Result<bool, StoreError>;

    /// Persist a freshly minted session (login/OAuth-exchange path).
    async fn insert(&self, session: Session) -> Result<(), StoreError>;
}

/// In-process session store backed by a concurrent map.
///
/// The persistence engine behind the contract is deliberately a black
/// box; this is the default used for single-node deployments and tests.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    codec: Arc<dyn JwtCodec>,
}

impl MemorySessionStore {
    /// Create an empty store that seals tokens with `codec` on update.
    #[must_use]
    pub fn new(codec: Arc<dyn JwtCodec>) -> Self {
        Self {
            sessions: DashMap::new(),
            codec,
        }
    }

    /// Number of live sessions (test/introspection helper).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_by_id(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn update_stored_jwt(&self, session_id: &str, new_jwt: &str) -> Result<bool, StoreError> {
        let sealed = self
            .codec
            .encrypt(new_jwt)
            .map_err(|e| StoreError::Data(e.to_string()))?;
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.stored_jwt = sealed;
                session.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.sessions.insert(session.id.to_string(), session);
        Ok(())
    }
}

//! Request-scoped refresh-token channel.
//!
//! When a handler calls the origin service, the response may carry a
//! just-refreshed identity token in [`REFRESH_HEADER`]. The handler's
//! return value carries only business data, so the token travels out of
//! band: the client's response hook calls [`record`], and the auth
//! middleware reads the slot after the handler returns.
//!
//! # Task-local scoping
//!
//! The slot is bound to the request's task via `tokio::task_local!` —
//! never a process global. Each request gets a fresh [`RefreshChannel`],
//! so concurrent requests cannot observe each other's tokens even when
//! the runtime reuses worker threads. The middleware keeps its own
//! handle to the channel, scopes the handler future with
//! [`with_channel`], and performs a single [`RefreshChannel::take`]
//! afterwards.

use std::sync::Arc;

use parking_lot::Mutex;

/// Backend-originated header carrying a refreshed identity token.
pub const REFRESH_HEADER: &str = "x-new-access-token";

/// Slot holding at most one refreshed token for the current request.
///
/// Cloning shares the slot; a later [`set`](Self::set) in the same
/// request supersedes an earlier one.
#[derive(Debug, Clone, Default)]
pub struct RefreshChannel {
    slot: Arc<Mutex<Option<String>>>,
}

impl RefreshChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a refreshed token.
    pub fn set(&self, token: String) {
        *self.slot.lock() = Some(token);
    }

    /// Read and atomically clear the slot.
    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }

    /// Empty the slot regardless of contents.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

tokio::task_local! {
    /// Task-local storage for the current request's refresh channel.
    ///
    /// Installed by [`with_channel`]; written by [`record`].
    static REFRESH_CHANNEL: RefreshChannel;
}

/// Run `future` with `channel` installed as the task-local refresh slot.
pub async fn with_channel<F, T>(channel: RefreshChannel, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    REFRESH_CHANNEL.scope(channel, future).await
}

/// Record a refreshed token into the current request's channel.
///
/// A no-op outside a [`with_channel`] scope (e.g. a background task with
/// no request to deliver to) — the token is dropped rather than leaked
/// into unrelated state.
pub fn record(token: impl Into<String>) {
    let token = token.into();
    if REFRESH_CHANNEL.try_with(|c| c.set(token)).is_err() {
        tracing::debug!("Refresh token observed outside a request scope; dropped");
    }
}

//! Server-side sessions: the keyed store contract and the sealing codec
//! that keeps backend identity tokens encrypted at rest.

mod crypto;
mod store;

pub use crypto::{CodecError, JwtCodec, SealingCodec};
pub use store::{MemorySessionStore, Session, SessionStore, StoreError};

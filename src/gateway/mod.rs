//! Gateway core: authentication middleware, cookie contract,
//! request-scoped refresh channel, router and server.

pub mod cookies;
pub mod middleware;
pub mod refresh;
pub mod router;
pub mod server;

pub use middleware::{AuthContext, ClientKind, resolve_credentials};
pub use refresh::{REFRESH_HEADER, RefreshChannel};
pub use router::{AppState, AuthPolicy, create_router};
pub use server::Gateway;

//! OAuth flow support: redirect-URI policy, callback parsing and the
//! HTTP handlers tying them to the auth backend.

pub mod callback;
pub mod handlers;
pub mod redirect;

pub use callback::{CallbackParams, parse_callback_url};
pub use redirect::{RedirectAllowlist, normalize_redirect_uri};

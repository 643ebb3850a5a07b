//! OAuth provider callback URL parsing.

use url::Url;

use crate::{Error, Result};

/// Parameters extracted from a provider callback URL.
///
/// `code` and `error` are not mutually exclusive: a provider may attach
/// an error alongside a stale code. Both are forwarded to the exchange
/// step unfiltered; this layer does not decide precedence between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code, absent on provider-side failure
    pub code: Option<String>,
    /// CSRF state token binding the callback to the original request
    pub state: String,
    /// Provider error code, absent on success
    pub error: Option<String>,
}

/// Extract `code`, `state` and `error` from a full callback URL.
///
/// `state` is mandatory: its absence or emptiness is a parse failure,
/// since it is the CSRF binding back to the authorization request.
pub fn parse_callback_url(callback_url: &str) -> Result<CallbackParams> {
    let parsed = Url::parse(callback_url)
        .map_err(|e| Error::InvalidRequest(format!("Failed to parse OAuth callback URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            // First occurrence wins
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match state {
        Some(state) if !state.is_empty() => Ok(CallbackParams { code, state, error }),
        _ => Err(Error::InvalidRequest(
            "Missing required 'state' parameter in callback URL".to_string(),
        )),
    }
}

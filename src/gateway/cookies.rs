//! Cookie contract for web clients.
//!
//! Names are fixed and case-sensitive. The session cookie carries the
//! opaque session id, never the backend JWT. All auth cookies are
//! `Secure` + `SameSite=Lax`; the is-authenticated flag deliberately
//! omits `HttpOnly` so client-side script can read it.

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use cookie::{Cookie, SameSite};

/// Session token cookie (web clients' credential carrier)
pub const SESSION_COOKIE: &str = "immich_access_token";
/// Marker cookie recording how the user authenticated
pub const AUTH_TYPE_COOKIE: &str = "immich_auth_type";
/// Convenience flag for the frontend; readable by script
pub const IS_AUTHENTICATED_COOKIE: &str = "immich_is_authenticated";

/// How a login was performed; recorded in [`AUTH_TYPE_COOKIE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// OAuth provider login
    OAuth,
    /// Password login
    Password,
}

impl AuthType {
    /// Cookie value for this auth type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::Password => "password",
        }
    }
}

/// Build the session cookie with the standard security flags.
#[must_use]
pub fn session_cookie(session_token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Build the full login cookie set: session token, auth-type marker and
/// the script-readable authenticated flag.
#[must_use]
pub fn auth_cookies(session_token: &str, auth_type: AuthType, secure: bool) -> [Cookie<'static>; 3] {
    [
        session_cookie(session_token, secure),
        Cookie::build((AUTH_TYPE_COOKIE, auth_type.as_str()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .build(),
        // No HttpOnly: the SPA reads this to decide whether to show the
        // login screen. It carries no secret.
        Cookie::build((IS_AUTHENTICATED_COOKIE, "true"))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .build(),
    ]
}

/// Look up a cookie value in a request's `Cookie` header.
#[must_use]
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw)
        .filter_map(std::result::Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Append a `Set-Cookie` header to an outgoing response.
pub fn append_set_cookie(response: &mut Response, cookie: &Cookie<'static>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn session_cookie_carries_security_flags() {
        let cookie = session_cookie("sid-123", true);
        let rendered = cookie.to_string();
        assert!(rendered.starts_with("immich_access_token=sid-123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
    }

    #[test]
    fn insecure_mode_drops_secure_flag_only() {
        let rendered = session_cookie("sid-123", false).to_string();
        assert!(rendered.contains("HttpOnly"));
        assert!(!rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
    }

    #[test]
    fn is_authenticated_flag_is_script_readable() {
        let [session, auth_type, flag] = auth_cookies("sid-123", AuthType::OAuth, true);
        assert!(session.to_string().contains("HttpOnly"));
        assert!(auth_type.to_string().contains("HttpOnly"));
        assert_eq!(auth_type.value(), "oauth");
        let flag = flag.to_string();
        assert!(!flag.contains("HttpOnly"), "flag must stay readable by script");
        assert!(flag.contains("Secure"));
        assert!(flag.contains("SameSite=Lax"));
    }

    #[test]
    fn request_cookie_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; immich_access_token=sid-456; x=y"),
        );
        assert_eq!(
            request_cookie(&headers, SESSION_COOKIE),
            Some("sid-456".to_string())
        );
        assert_eq!(request_cookie(&headers, "missing"), None);
    }

    #[test]
    fn request_cookie_tolerates_malformed_entries() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("garbage;; immich_access_token=sid-789"),
        );
        assert_eq!(
            request_cookie(&headers, SESSION_COOKIE),
            Some("sid-789".to_string())
        );
    }

    #[test]
    fn request_cookie_none_without_header() {
        assert_eq!(request_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
    }
}

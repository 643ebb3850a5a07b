//! Redirect-URI normalization and allowlist membership.
//!
//! OAuth redirect URIs arrive from clients in many equivalent spellings;
//! allowlist checks compare canonical forms so `HTTP://Host:80/a/` and
//! `http://host/a` are treated as the same target.

use url::Url;

/// Canonicalize a redirect URI for comparison.
///
/// - scheme and host lowercased (path stays case-sensitive)
/// - default ports stripped (`:80` for http, `:443` for https);
///   non-default ports preserved
/// - trailing slashes stripped from the path; empty path becomes `/`
/// - query preserved verbatim, parameter order included
/// - fragment dropped
///
/// Inputs that do not parse as absolute URLs are returned unchanged so
/// they can never accidentally match an allowlist entry. The same
/// applies to non-hierarchical URIs (`mailto:`, `data:`): reassembling
/// them would invent an authority they never had.
#[must_use]
pub fn normalize_redirect_uri(uri: &str) -> String {
    let Ok(parsed) = Url::parse(uri) else {
        return uri.to_string();
    };
    if parsed.cannot_be_a_base() {
        return uri.to_string();
    }

    let scheme = parsed.scheme().to_lowercase();
    let host = parsed.host_str().unwrap_or("").to_lowercase();

    let port = match (parsed.port(), scheme.as_str()) {
        (Some(80), "http") | (Some(443), "https") | (None, _) => String::new(),
        (Some(p), _) => format!(":{p}"),
    };

    let path = parsed.path().trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    let query = parsed
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();

    format!("{scheme}://{host}{port}{path}{query}")
}

/// Configured set of permitted redirect URIs, held in normalized form.
#[derive(Debug, Clone, Default)]
pub struct RedirectAllowlist {
    entries: Vec<String>,
}

impl RedirectAllowlist {
    /// Build an allowlist, normalizing every configured entry.
    #[must_use]
    pub fn new<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: uris
                .into_iter()
                .map(|u| normalize_redirect_uri(u.as_ref()))
                .collect(),
        }
    }

    /// Membership test: canonical forms must be identical strings.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        let normalized = normalize_redirect_uri(uri);
        self.entries.iter().any(|e| *e == normalized)
    }

    /// Whether any redirect URIs are configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowercases_scheme_and_host_only() {
        assert_eq!(
            normalize_redirect_uri("HTTP://LocalHost/Auth/Callback"),
            "http://localhost/Auth/Callback"
        );
    }

    #[test]
    fn strips_default_ports() {
        assert_eq!(
            normalize_redirect_uri("http://localhost:80/auth/callback"),
            "http://localhost/auth/callback"
        );
        assert_eq!(
            normalize_redirect_uri("https://app.example.com:443/oauth"),
            "https://app.example.com/oauth"
        );
    }

    #[test]
    fn preserves_non_default_ports() {
        assert_eq!(
            normalize_redirect_uri("http://localhost:8080/callback/"),
            "http://localhost:8080/callback"
        );
        assert_eq!(
            normalize_redirect_uri("https://example.com:8443/cb"),
            "https://example.com:8443/cb"
        );
    }

    #[test]
    fn strips_trailing_slashes_except_root() {
        assert_eq!(normalize_redirect_uri("http://example.com/a/"), "http://example.com/a");
        assert_eq!(normalize_redirect_uri("http://example.com/a///"), "http://example.com/a");
        assert_eq!(normalize_redirect_uri("http://example.com"), "http://example.com/");
        assert_eq!(normalize_redirect_uri("http://example.com///"), "http://example.com/");
    }

    #[test]
    fn preserves_query_drops_fragment() {
        assert_eq!(
            normalize_redirect_uri("http://example.com?state=abc&b=2"),
            "http://example.com/?state=abc&b=2"
        );
        assert_eq!(
            normalize_redirect_uri("http://example.com?state=abc#frag"),
            "http://example.com/?state=abc"
        );
        assert_eq!(normalize_redirect_uri("http://example.com#fragment"), "http://example.com/");
    }

    #[test]
    fn equivalence_property() {
        assert_eq!(
            normalize_redirect_uri("HTTP://Host:80/a/"),
            normalize_redirect_uri("http://host/a")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "HTTP://LocalHost:80/auth/callback/",
            "https://app.example.com:443/oauth",
            "http://localhost:8080/callback/",
            "http://example.com?state=abc#frag",
            "app.immich:///oauth-callback",
            "mailto:admin@example.com",
            "data:text/plain,hello",
            "not a url at all",
        ] {
            let once = normalize_redirect_uri(input);
            assert_eq!(normalize_redirect_uri(&once), once, "input: {input}");
        }
    }

    #[test]
    fn non_hierarchical_uris_pass_through_unchanged() {
        assert_eq!(normalize_redirect_uri("mailto:x"), "mailto:x");
        assert_eq!(
            normalize_redirect_uri("data:text/plain,hello"),
            "data:text/plain,hello"
        );
    }

    #[test]
    fn unparseable_input_never_matches_allowlist() {
        let allowlist = RedirectAllowlist::new(["http://localhost/cb"]);
        assert!(!allowlist.contains("::not-a-uri::"));
    }

    #[test]
    fn allowlist_matches_across_spellings() {
        let allowlist = RedirectAllowlist::new(["HTTP://LocalHost:80/auth/callback/"]);
        assert!(allowlist.contains("http://localhost/auth/callback"));
        assert!(allowlist.contains("http://LOCALHOST/auth/callback/"));
        assert!(!allowlist.contains("https://evil.example/x"));
        assert!(!allowlist.contains("http://localhost/auth/callback/deeper"));
    }
}

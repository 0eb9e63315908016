//! Base URI handling and the scope filter.
//!
//! A resource is in scope when its identifier starts with the base URI,
//! compared byte for byte. The only normalisation is on the configured base:
//! one trailing `/` is trimmed before it is used.

use crate::contract::FixedOrigin;
use tracing::debug;

/// Base used when neither an explicit base nor a fixed origin is available.
pub const DEFAULT_BASE: &str = "http://localhost";

/// Trim a single trailing `/` from a configured base.
pub fn normalise_base(base: &str) -> &str {
    base.strip_suffix('/').unwrap_or(base)
}

/// Base URI derived from the application's fixed scheme and authority.
///
/// `https` + `example.com` gives `https://example.com`; an empty authority
/// gives `scheme:` with no `//`.
pub fn origin_base(origin: &FixedOrigin) -> String {
    let slashes = if origin.authority.is_empty() { "" } else { "//" };
    format!("{}:{}{}", origin.scheme, slashes, origin.authority)
}

/// Pick the base URI for a run: explicit value first, then the fixed origin,
/// then [`DEFAULT_BASE`].
pub fn resolve_base(explicit: Option<&str>, origin: Option<&FixedOrigin>) -> String {
    match (explicit.filter(|b| !b.is_empty()), origin) {
        (Some(base), _) => normalise_base(base).to_string(),
        (None, Some(origin)) => origin_base(origin),
        (None, None) => DEFAULT_BASE.to_string(),
    }
}

/// Whether `identifier` lies under `base`.
pub fn in_scope(identifier: &str, base: &str) -> bool {
    identifier.starts_with(base)
}

/// Keep exactly the identifiers under `base`, preserving their order.
pub fn filter_in_scope<I>(base: &str, identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    identifiers
        .into_iter()
        .filter(|uri| {
            let keep = in_scope(uri, base);
            if !keep {
                debug!(uri = %uri, base = %base, "[PUBLISH] Resource outside base, excluded");
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(scheme: &str, authority: &str) -> FixedOrigin {
        FixedOrigin {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
        }
    }

    #[test]
    fn trims_exactly_one_trailing_slash() {
        assert_eq!(normalise_base("http://example.com/"), "http://example.com");
        assert_eq!(normalise_base("http://example.com//"), "http://example.com/");
        assert_eq!(normalise_base("http://example.com"), "http://example.com");
    }

    #[test]
    fn explicit_base_wins_over_fixed_origin() {
        let o = origin("https", "example.com");
        assert_eq!(
            resolve_base(Some("http://staging.example.com/"), Some(&o)),
            "http://staging.example.com"
        );
    }

    #[test]
    fn fixed_origin_is_used_when_no_explicit_base() {
        assert_eq!(
            resolve_base(None, Some(&origin("https", "example.com"))),
            "https://example.com"
        );
        assert_eq!(resolve_base(None, Some(&origin("urn", ""))), "urn:");
    }

    #[test]
    fn falls_back_to_localhost() {
        assert_eq!(resolve_base(None, None), "http://localhost");
        assert_eq!(resolve_base(Some(""), None), "http://localhost");
    }

    #[test]
    fn filter_is_case_sensitive_prefix_match() {
        let kept = filter_in_scope(
            "http://localhost",
            vec![
                "http://localhost/index.html".to_string(),
                "HTTP://localhost/upper.html".to_string(),
                "http://external/x.html".to_string(),
                "http://localhost/about/".to_string(),
            ],
        );
        assert_eq!(
            kept,
            vec![
                "http://localhost/index.html".to_string(),
                "http://localhost/about/".to_string(),
            ]
        );
    }
}

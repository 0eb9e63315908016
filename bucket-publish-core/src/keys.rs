//! Rewriting resource identifiers into storage keys.

/// Map an in-scope identifier to its storage key.
///
/// Returns `None` when the identifier is not a leaf resource: it does not
/// start with `base`, the remainder does not start with `/`, or the
/// remainder ends with `/`. Directory-shaped identifiers get no default
/// document.
///
/// ```
/// use bucket_publish_core::keys::map_key;
///
/// let key = map_key("http://localhost/a/b.html", "http://localhost", "pfx/");
/// assert_eq!(key.as_deref(), Some("pfx/a/b.html"));
/// ```
pub fn map_key(identifier: &str, base: &str, prefix: &str) -> Option<String> {
    let path = identifier.strip_prefix(base)?;
    let rest = path.strip_prefix('/')?;
    if path.ends_with('/') {
        return None;
    }
    Some(format!("{prefix}{rest}"))
}

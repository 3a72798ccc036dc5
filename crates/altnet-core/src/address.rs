//! Navigation addresses and the URL lineage relation.
//!
//! An address is whatever the user typed or a generated link pointed at.
//! Stripped of its scheme and lowercased it becomes the lineage key stored on
//! every record and node.

/// Scheme prefixes recognised on generated links. The first is the one the
/// generator is instructed to emit; the rest are accepted for older content.
pub const SCHEMES: &[&str] = &["altnet://", "alt://"];

/// Remove a recognised scheme prefix. Unprefixed addresses are returned as-is.
pub fn strip_scheme(address: &str) -> &str {
    for scheme in SCHEMES {
        if address.len() >= scheme.len()
            && address.is_char_boundary(scheme.len())
            && address[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            return &address[scheme.len()..];
        }
    }
    address
}

/// Canonical lineage key: scheme stripped, whitespace trimmed, lowercased.
pub fn normalize(address: &str) -> String {
    strip_scheme(address.trim()).trim().to_lowercase()
}

/// True when `prefix` is a segment-respecting strict prefix of `url`:
/// `a` is a prefix of `a/b` but not of `ab`, and never of itself.
pub fn is_path_prefix(prefix: &str, url: &str) -> bool {
    !prefix.is_empty()
        && url.len() > prefix.len()
        && url.starts_with(prefix)
        && url.as_bytes()[prefix.len()] == b'/'
}

/// Two normalized URLs belong to the same lineage when they are equal or one
/// extends the other by whole path segments. Empty URLs relate to nothing.
pub fn is_related(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || is_path_prefix(a, b) || is_path_prefix(b, a)
}

/// Storage URL for a regenerated address that already has published records:
/// `base~N` where `N` is one more than the number of records under `base`.
pub fn disambiguated(base: &str, existing: usize) -> String {
    format!("{base}~{}", existing + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_schemes() {
        assert_eq!(strip_scheme("altnet://wiki.alt/cats"), "wiki.alt/cats");
        assert_eq!(strip_scheme("alt://wiki.alt/cats"), "wiki.alt/cats");
        assert_eq!(strip_scheme("ALTNET://Wiki"), "Wiki");
    }

    #[test]
    fn leaves_unprefixed_addresses() {
        assert_eq!(strip_scheme("wiki.alt/cats"), "wiki.alt/cats");
        assert_eq!(strip_scheme("https://example.com"), "https://example.com");
        assert_eq!(strip_scheme(""), "");
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize("  altnet://Wiki.Alt/Cats "), "wiki.alt/cats");
        assert_eq!(normalize("News.Alt"), "news.alt");
    }

    #[test]
    fn prefix_respects_segments() {
        assert!(is_path_prefix("a", "a/b"));
        assert!(is_path_prefix("a/b", "a/b/c"));
        assert!(!is_path_prefix("a", "ab"));
        assert!(!is_path_prefix("a", "a"));
        assert!(!is_path_prefix("", "a/b"));
    }

    #[test]
    fn relation_is_symmetric() {
        assert!(is_related("a", "a"));
        assert!(is_related("a", "a/b/c"));
        assert!(is_related("a/b/c", "a"));
        assert!(!is_related("a/b", "a/c"));
        assert!(!is_related("a", "ab"));
        assert!(!is_related("", ""));
    }

    #[test]
    fn disambiguated_suffix() {
        assert_eq!(disambiguated("wiki.alt", 1), "wiki.alt~2");
        assert_eq!(disambiguated("wiki.alt", 0), "wiki.alt~1");
    }

    #[test]
    fn multibyte_address_does_not_panic() {
        assert_eq!(strip_scheme("日本"), "日本");
        assert!(!is_path_prefix("日", "日本"));
    }
}

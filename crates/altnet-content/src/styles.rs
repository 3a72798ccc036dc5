//! Selector scoping so generated styles only reach the generated page.

use std::sync::LazyLock;

use regex::Regex;

/// Class of the container every generated page is rendered inside.
pub const NAMESPACE_CLASS: &str = "altnet-page";

static KEYFRAME_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:from|to|\d+(?:\.\d+)?%)$").unwrap());

/// Prefix every rule's selectors with `.altnet-page`.
///
/// Keyframe stops and selectors already naming the namespace class are left
/// alone. At-rule preludes, `;`-terminated at-statements and comments pass
/// through unchanged, as do declaration blocks.
pub fn scope_styles(css: &str) -> String {
    if css.trim().is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(css.len() + 64);
    let mut prelude = String::new();
    let mut rest = css;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("/*") {
            let len = comment_len(rest);
            if prelude.trim().is_empty() {
                out.push_str(&prelude);
                prelude.clear();
                out.push_str(&rest[..len]);
            } else {
                prelude.push_str(&rest[..len]);
            }
            rest = &rest[len..];
            continue;
        }
        match c {
            '"' | '\'' | '(' => {
                let len = if c == '(' { group_len(rest) } else { quoted_len(rest) };
                prelude.push_str(&rest[..len]);
                rest = &rest[len..];
            }
            '{' => {
                rest = &rest[1..];
                let trimmed = prelude.trim_start();
                if trimmed.starts_with('@') {
                    let nested = holds_rules(trimmed);
                    out.push_str(&prelude);
                    out.push('{');
                    prelude.clear();
                    if nested {
                        continue;
                    }
                } else {
                    out.push_str(&prelude[..prelude.len() - trimmed.len()]);
                    out.push_str(&scope_selector_list(trimmed));
                    out.push_str(" {");
                    prelude.clear();
                }
                let len = block_len(rest);
                out.push_str(&rest[..len]);
                rest = &rest[len..];
            }
            ';' | '}' => {
                out.push_str(&prelude);
                out.push(c);
                prelude.clear();
                rest = &rest[1..];
            }
            _ => {
                prelude.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out.push_str(&prelude);
    out
}

/// At-rules whose block holds rules rather than declarations.
fn holds_rules(prelude: &str) -> bool {
    let name: String = prelude[1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    name.ends_with("keyframes")
        || matches!(name.as_str(), "media" | "supports" | "layer" | "container" | "scope" | "document" | "-moz-document")
}

fn scope_selector_list(selectors: &str) -> String {
    let mut parts = Vec::new();
    let (mut depth, mut start) = (0usize, 0);
    for (i, b) in selectors.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(scope_selector(&selectors[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(scope_selector(&selectors[start..]));
    parts.join(", ")
}

fn scope_selector(selector: &str) -> String {
    let selector = selector.trim();
    if selector.is_empty() || KEYFRAME_STOP.is_match(selector) || selector.contains(NAMESPACE_CLASS) {
        return selector.to_string();
    }
    format!(".{NAMESPACE_CLASS} {selector}")
}

// ── Scanning helpers: each returns a byte length into `s`, or `s.len()`
// when the construct is unterminated. ─────────────────────────────────────

fn comment_len(s: &str) -> usize {
    s[2..].find("*/").map_or(s.len(), |i| i + 4)
}

/// `s` starts at a quote.
fn quoted_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    s.len()
}

/// `s` starts at `(`; runs to the matching `)`.
fn group_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let (mut depth, mut i) = (0usize, 0);
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i += quoted_len(&s[i..]);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    s.len()
}

/// `s` starts just after a `{`; runs through the matching `}`.
fn block_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let (mut depth, mut i) = (1usize, 0);
    while i < bytes.len() {
        if s[i..].starts_with("/*") {
            i += comment_len(&s[i..]);
            continue;
        }
        match bytes[i] {
            b'"' | b'\'' => {
                i += quoted_len(&s[i..]);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_simple_rule() {
        assert_eq!(scope_styles(".x{color:red}"), ".altnet-page .x {color:red}");
    }

    #[test]
    fn prefixes_each_selector_in_list() {
        let out = scope_styles("h1, h2 > a { margin: 0 }");
        assert_eq!(out, ".altnet-page h1, .altnet-page h2 > a { margin: 0 }");
    }

    #[test]
    fn leaves_keyframe_stops() {
        assert_eq!(scope_styles("50%{top:0}"), "50% {top:0}");
        let out = scope_styles("@keyframes spin {\nfrom { opacity: 0 }\nto { opacity: 1 }\n}");
        assert!(out.contains("from {"));
        assert!(out.contains("to {"));
        assert!(!out.contains(".altnet-page from"));
        assert!(out.starts_with("@keyframes spin {"));
    }

    #[test]
    fn keeps_already_scoped_selectors() {
        assert_eq!(scope_styles(".altnet-page p{x:y}"), ".altnet-page p {x:y}");
    }

    #[test]
    fn scopes_rules_inside_media_blocks() {
        let out = scope_styles("@media (max-width: 600px) { .card { padding: 0 } }");
        assert!(out.starts_with("@media (max-width: 600px) {"));
        assert!(out.contains(".altnet-page .card {"));
    }

    #[test]
    fn multiline_stylesheet() {
        let css = ".a {\n  color: red;\n}\n.b {\n  color: blue\n}";
        let out = scope_styles(css);
        assert!(out.contains(".altnet-page .a {"));
        assert!(out.contains(".altnet-page .b {"));
        assert!(out.contains("color: red;"));
        assert!(!out.contains(".altnet-page color"));
    }

    #[test]
    fn import_lines_untouched() {
        let out = scope_styles("@import url(a.css);\nbody { margin: 0 }");
        assert!(out.starts_with("@import url(a.css);"));
        assert!(out.contains(".altnet-page body {"));
    }

    #[test]
    fn rule_after_comment_is_scoped() {
        let out = scope_styles("/* reset */ body{margin:0}");
        assert_eq!(out, "/* reset */ .altnet-page body {margin:0}");
    }

    #[test]
    fn rule_after_import_on_same_line_is_scoped() {
        let out = scope_styles("@import url(x.css); .a{color:red}");
        assert_eq!(out, "@import url(x.css); .altnet-page .a {color:red}");
    }

    #[test]
    fn declarations_and_font_face_are_not_rewritten() {
        let css = "@font-face { font-family: X; src: url(\"a;b{c}.woff\") }\n.a { background: url(data:x;y) }";
        let out = scope_styles(css);
        assert!(out.starts_with("@font-face { font-family: X; src: url(\"a;b{c}.woff\") }"));
        assert!(out.contains(".altnet-page .a { background: url(data:x;y) }"));
    }

    #[test]
    fn commas_inside_pseudo_classes_stay_together() {
        assert_eq!(scope_styles(":is(h1, h2) a{x:y}"), ".altnet-page :is(h1, h2) a {x:y}");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(scope_styles(""), "");
        assert_eq!(scope_styles("  \n\t"), "");
    }
}

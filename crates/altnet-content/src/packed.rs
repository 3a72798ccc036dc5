//! The single-string storage form of a generated page.
//!
//! Pages without css or js keep the legacy plain form, markup inside the
//! namespace container. Anything else is stored as a tagged, versioned JSON
//! envelope. Decoding matches on the tag and version, so a plain page that
//! happens to be JSON-looking is still returned as markup.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::ContentParts;
use crate::html::truncate_chars;
use crate::styles::NAMESPACE_CLASS;

/// Envelope version written by [`pack_content`].
pub const ENVELOPE_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
enum Envelope {
    Structured {
        version: u32,
        #[serde(default)]
        html: String,
        #[serde(default)]
        css: String,
        #[serde(default)]
        js: String,
    },
}

/// Wrap markup in the namespace container.
pub fn wrap_legacy(html: &str) -> String {
    format!(r#"<div class="{NAMESPACE_CLASS}">{html}</div>"#)
}

/// Encode the three parts into one storable string.
pub fn pack_content(html: &str, css: &str, js: &str) -> String {
    if css.is_empty() && js.is_empty() {
        return wrap_legacy(html);
    }

    let envelope = Envelope::Structured {
        version: ENVELOPE_VERSION,
        html: html.to_string(),
        css: css.to_string(),
        js: js.to_string(),
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode content envelope, storing markup only");
            wrap_legacy(html)
        }
    }
}

/// Decode a stored string. Never fails: anything that is not a supported
/// envelope is returned as raw html with empty css and js.
pub fn unpack_content(stored: &str) -> ContentParts {
    if stored.is_empty() {
        return ContentParts::default();
    }

    match serde_json::from_str::<Envelope>(stored) {
        Ok(Envelope::Structured { version, html, css, js }) if version == ENVELOPE_VERSION => {
            return ContentParts { html, css, js };
        }
        Ok(Envelope::Structured { version, .. }) => {
            warn!(version, "unsupported content envelope version, treating as markup");
        }
        Err(_) => {}
    }

    ContentParts::html_only(stored)
}

/// Pack, shrinking the parts until the result fits in `max_len` bytes.
///
/// Markup is cut first, then script, then styles.
pub fn pack_bounded(parts: &ContentParts, max_len: usize) -> String {
    let mut html = parts.html.clone();
    let mut css = parts.css.clone();
    let mut js = parts.js.clone();

    loop {
        let packed = pack_content(&html, &css, &js);
        if packed.len() <= max_len {
            return packed;
        }
        let overflow = packed.len() - max_len;
        let field = if !html.is_empty() {
            &mut html
        } else if !js.is_empty() {
            &mut js
        } else if !css.is_empty() {
            &mut css
        } else {
            return truncate_chars(&packed, max_len).to_string();
        };
        let keep = field.chars().count().saturating_sub(overflow);
        *field = truncate_chars(field, keep).to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_round_trip() {
        let cases = [
            ("<h1>Hi</h1>", "h1{color:red}", ""),
            ("<p>x</p>", "", "console.log('</script>')"),
            ("", "p{}", "go()"),
            ("<p>\"quoted\" {braces}</p>", "a{}", "x = {\"k\": 1}"),
        ];
        for (h, c, j) in cases {
            assert_eq!(unpack_content(&pack_content(h, c, j)), ContentParts::new(h, c, j));
        }
    }

    #[test]
    fn legacy_round_trip_wraps_markup() {
        let packed = pack_content("<h1>Hi</h1>", "", "");
        assert_eq!(packed, r#"<div class="altnet-page"><h1>Hi</h1></div>"#);
        let parts = unpack_content(&packed);
        assert_eq!(parts.html, wrap_legacy("<h1>Hi</h1>"));
        assert!(parts.css.is_empty());
        assert!(parts.js.is_empty());
    }

    #[test]
    fn envelope_is_tagged_and_versioned() {
        let value: serde_json::Value = serde_json::from_str(&pack_content("a", "b", "c")).unwrap();
        assert_eq!(value["format"], "structured");
        assert_eq!(value["version"], 2);
        assert_eq!(value["html"], "a");
    }

    #[test]
    fn empty_input_is_three_empty_parts() {
        assert_eq!(unpack_content(""), ContentParts::default());
    }

    #[test]
    fn plain_json_is_markup() {
        let stored = r#"{"html":"<p>x</p>","css":"p{}"}"#;
        assert_eq!(unpack_content(stored), ContentParts::html_only(stored));
    }

    #[test]
    fn unsupported_version_is_markup() {
        let stored = r#"{"format":"structured","version":9,"html":"x","css":"y","js":""}"#;
        assert_eq!(unpack_content(stored), ContentParts::html_only(stored));
    }

    #[test]
    fn broken_json_is_markup() {
        let stored = r#"{"format":"structured","version":2,"html":"#;
        assert_eq!(unpack_content(stored).html, stored);
    }

    #[test]
    fn envelope_after_whitespace_decodes() {
        let packed = format!("\n  {}", pack_content("<p>x</p>", "p{}", ""));
        assert_eq!(unpack_content(&packed), ContentParts::new("<p>x</p>", "p{}", ""));
    }

    #[test]
    fn markup_and_bare_json_values_stay_markup() {
        for stored in ["<p>{x}</p>", "\"structured\"", "[1, 2]", "42"] {
            assert_eq!(unpack_content(stored), ContentParts::html_only(stored));
        }
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let parts = unpack_content(r#"{"format":"structured","version":2,"js":"go()"}"#);
        assert_eq!(parts, ContentParts::new("", "", "go()"));
    }

    #[test]
    fn bounded_pack_fits_and_decodes() {
        let parts = ContentParts::new("<p>".to_string() + &"word ".repeat(5000) + "</p>", "p{}", "go()");
        let packed = pack_bounded(&parts, 1000);
        assert!(packed.len() <= 1000);
        let back = unpack_content(&packed);
        assert_eq!(back.css, "p{}");
        assert_eq!(back.js, "go()");
        assert!(back.html.starts_with("<p>word"));
    }

    #[test]
    fn bounded_pack_leaves_small_content_alone() {
        let parts = ContentParts::new("<p>x</p>", "p{}", "");
        assert_eq!(pack_bounded(&parts, 40_000), pack_content("<p>x</p>", "p{}", ""));
    }
}

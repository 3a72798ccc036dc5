//! Parsing of raw generator output into the `{html, css, js}` triple.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*```[a-z0-9_-]*[ \t]*\r?\n?").unwrap());
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^===(\w+)===[ \t\r]*$").unwrap());

/// The three parts of a generated page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentParts {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl ContentParts {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    pub fn html_only(html: impl Into<String>) -> Self {
        Self::new(html, "", "")
    }

    /// Whether the page carries script and so needs the isolated render path.
    pub fn has_script(&self) -> bool {
        !self.js.trim().is_empty()
    }

    /// True when only markup is present and the legacy plain form applies.
    pub fn is_plain(&self) -> bool {
        self.css.is_empty() && self.js.is_empty()
    }
}

/// Remove a fenced-code wrapper the model may have put around its output.
pub fn strip_fences(raw: &str) -> &str {
    let start = LEADING_FENCE.find(raw).map_or(0, |m| m.end());
    let body = &raw[start..];
    match TRAILING_FENCE.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    }
}

/// Split generator output on `===NAME===` markers.
///
/// Never fails: without markers the whole input is html. Text preceding the
/// first marker is kept as extra html. Names are case-insensitive and looked
/// up independently of their order; unknown names are dropped and a repeated
/// name keeps its last body.
pub fn parse_generated_output(raw: &str) -> ContentParts {
    let raw = strip_fences(raw);

    let markers: Vec<(String, usize, usize)> = SECTION_MARKER
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((name.as_str().to_ascii_uppercase(), whole.start(), whole.end()))
        })
        .collect();

    if markers.is_empty() {
        return ContentParts::html_only(raw.trim());
    }

    let before = raw[..markers[0].1].trim();
    let mut sections: HashMap<&str, &str> = HashMap::new();
    for (i, (name, _, end)) in markers.iter().enumerate() {
        let stop = markers.get(i + 1).map_or(raw.len(), |next| next.1);
        sections.insert(name.as_str(), raw[*end..stop].trim());
    }

    let section = |name: &str| sections.get(name).copied().unwrap_or("");
    let html = [before, section("HTML")]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    ContentParts {
        html,
        css: section("CSS").to_string(),
        js: section("JS").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_sections() {
        let raw = "===HTML===\n<h1>Hi</h1>\n===CSS===\nh1{color:red}\n===JS===\nconsole.log(1)\n";
        let parts = parse_generated_output(raw);
        assert_eq!(parts.html, "<h1>Hi</h1>");
        assert_eq!(parts.css, "h1{color:red}");
        assert_eq!(parts.js, "console.log(1)");
    }

    #[test]
    fn section_order_is_irrelevant() {
        let a = parse_generated_output("===HTML===\n<p>x</p>\n===CSS===\np{}\n===JS===\nlet a=1;");
        let b = parse_generated_output("===JS===\nlet a=1;\n===HTML===\n<p>x</p>\n===CSS===\np{}");
        let c = parse_generated_output("===CSS===\np{}\n===JS===\nlet a=1;\n===HTML===\n<p>x</p>");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn no_markers_is_raw_html() {
        let raw = "<h1>Plain</h1><p>page</p>";
        assert_eq!(parse_generated_output(raw), ContentParts::html_only(raw));
    }

    #[test]
    fn markers_are_case_insensitive() {
        let parts = parse_generated_output("===html===\n<b>x</b>\n===Css===\nb{}\n");
        assert_eq!(parts.html, "<b>x</b>");
        assert_eq!(parts.css, "b{}");
        assert!(parts.js.is_empty());
    }

    #[test]
    fn preamble_becomes_extra_html() {
        let parts = parse_generated_output("<header>top</header>\n===HTML===\n<main>body</main>");
        assert_eq!(parts.html, "<header>top</header>\n<main>body</main>");
    }

    #[test]
    fn strips_code_fences() {
        let raw = "```html\n===HTML===\n<p>fenced</p>\n===CSS===\np{}\n```";
        let parts = parse_generated_output(raw);
        assert_eq!(parts.html, "<p>fenced</p>");
        assert_eq!(parts.css, "p{}");
    }

    #[test]
    fn strips_fences_around_plain_html() {
        assert_eq!(parse_generated_output("```\n<p>x</p>\n```").html, "<p>x</p>");
    }

    #[test]
    fn marker_must_be_on_its_own_line() {
        let raw = "<p>see ===CSS=== inline</p>";
        assert_eq!(parse_generated_output(raw).html, raw);
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let parts = parse_generated_output("===NOTES===\nignore me\n===HTML===\n<p>x</p>");
        assert_eq!(parts, ContentParts::html_only("<p>x</p>"));
    }

    #[test]
    fn script_detection_ignores_whitespace() {
        assert!(!ContentParts::new("<p/>", "p{}", "  \n").has_script());
        assert!(ContentParts::new("<p/>", "", "go()").has_script());
        assert!(ContentParts::html_only("<p/>").is_plain());
    }
}

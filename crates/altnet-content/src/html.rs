//! Text helpers over generated markup.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const TITLE_MAX_CHARS: usize = 100;
const PREVIEW_MAX_CHARS: usize = 200;

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").unwrap());

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Visible text of `html`, whitespace collapsed. Style and script bodies are
/// not text.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    visible_text(fragment.root_element(), false)
}

/// Text of the first `<h1>`, at most 100 characters. Empty when there is none.
pub fn extract_title(html: &str) -> String {
    select_texts(html, "h1")
        .into_iter()
        .next()
        .map(|t| truncate_chars(&t, TITLE_MAX_CHARS).to_string())
        .unwrap_or_default()
}

/// Feed preview: the page text without its first heading, first 200 characters.
pub fn derive_preview(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = visible_text(fragment.root_element(), true);
    truncate_chars(&text, PREVIEW_MAX_CHARS).trim().to_string()
}

/// Lift inline `<style>` blocks out of the markup.
///
/// Returns the markup without them and their bodies joined by newlines.
pub fn extract_style_blocks(html: &str) -> (String, String) {
    let bodies: Vec<&str> = STYLE_BLOCK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .filter(|body| !body.is_empty())
        .collect();
    if bodies.is_empty() {
        return (html.to_string(), String::new());
    }
    let stripped = STYLE_BLOCK.replace_all(html, "").into_owned();
    (stripped, bodies.join("\n"))
}

/// Trimmed, whitespace-collapsed text of every element matching `selector`,
/// in document order. Empty texts are skipped.
pub fn select_texts(html: &str, selector: &str) -> Vec<String> {
    let Some(selector) = Selector::parse(selector).ok() else {
        return Vec::new();
    };
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Every anchor `href` in document order.
pub fn collect_links(html: &str) -> Vec<String> {
    let Some(selector) = Selector::parse("a[href]").ok() else {
        return Vec::new();
    };
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn visible_text(root: ElementRef<'_>, skip_first_heading: bool) -> String {
    let skipped = if skip_first_heading {
        Selector::parse("h1")
            .ok()
            .and_then(|s| root.select(&s).next())
            .map(|h1| h1.id())
    } else {
        None
    };

    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            Some(ancestor.id()) == skipped
                || ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "style" | "script"))
        });
        if hidden {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    collapse_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn plain_text_skips_style_and_script() {
        let html = "<style>p{color:red}</style><h1>Title</h1><p>Body   text</p><script>var x = 1;</script>";
        assert_eq!(plain_text(html), "Title Body text");
    }

    #[test]
    fn title_from_first_heading() {
        assert_eq!(extract_title("<p>intro</p><h1> The  Page </h1><h1>Second</h1>"), "The Page");
        assert_eq!(extract_title("<p>no heading</p>"), "");
        let long = format!("<h1>{}</h1>", "x".repeat(150));
        assert_eq!(extract_title(&long).len(), 100);
    }

    #[test]
    fn preview_drops_first_heading() {
        let html = "<h1>Cats</h1><p>Cats are a kind of animal.</p><h1>More</h1>";
        assert_eq!(derive_preview(html), "Cats are a kind of animal. More");
    }

    #[test]
    fn preview_is_bounded() {
        let html = format!("<p>{}</p>", "word ".repeat(100));
        assert!(derive_preview(&html).chars().count() <= 200);
    }

    #[test]
    fn style_blocks_are_lifted() {
        let (html, css) = extract_style_blocks("<style>a{x:y}</style><p>hi</p><STYLE type=\"text/css\">b{}</STYLE>");
        assert_eq!(html, "<p>hi</p>");
        assert_eq!(css, "a{x:y}\nb{}");
    }

    #[test]
    fn no_style_blocks_is_identity() {
        let (html, css) = extract_style_blocks("<p>hi</p>");
        assert_eq!(html, "<p>hi</p>");
        assert!(css.is_empty());
    }

    #[test]
    fn links_in_order() {
        let html = r#"<a href="altnet://a">A</a><a>no href</a><a href="b/c">B</a>"#;
        assert_eq!(collect_links(html), vec!["altnet://a", "b/c"]);
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_attr(r#"a "b" <c> & d"#), "a &quot;b&quot; &lt;c&gt; &amp; d");
        assert_eq!(escape_text("<p>"), "&lt;p&gt;");
    }
}

use altnet_content::html::{collect_links, extract_style_blocks};
use altnet_content::{scope_styles, ContentParts, NAMESPACE_CLASS};
use serde::Serialize;

use crate::document::{sandbox_document, sandbox_frame};

/// How a page is displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Markup placed directly in the host under the namespace container.
    Inline,
    /// A self-contained document in a script-enabled, origin-less frame.
    Sandboxed,
}

impl RenderMode {
    /// Script, and only script, forces isolation.
    pub fn for_parts(parts: &ContentParts) -> Self {
        if parts.has_script() {
            Self::Sandboxed
        } else {
            Self::Inline
        }
    }
}

/// Output of rendering one page, ready to hand to a render target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedView {
    pub mode: RenderMode,
    /// Host markup: the namespaced container, or the frame element.
    pub markup: String,
    /// The isolated document for sandboxed pages.
    pub document: Option<String>,
    /// Anchor targets the host intercepts. Empty for sandboxed pages, whose
    /// links arrive as bridge messages instead.
    pub links: Vec<String>,
}

/// Render a page. Image placeholders must already be resolved.
pub fn render_page(parts: &ContentParts) -> RenderedView {
    let (html, lifted) = extract_style_blocks(&parts.html);
    let css = [lifted.as_str(), parts.css.as_str()]
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let css = scope_styles(&css);

    match RenderMode::for_parts(parts) {
        RenderMode::Inline => {
            let style = if css.is_empty() {
                String::new()
            } else {
                format!("<style>{css}</style>")
            };
            RenderedView {
                mode: RenderMode::Inline,
                markup: format!(r#"<div class="{NAMESPACE_CLASS}">{style}{html}</div>"#),
                document: None,
                links: collect_links(&html),
            }
        }
        RenderMode::Sandboxed => {
            let document = sandbox_document(&html, &css, &parts.js);
            RenderedView {
                mode: RenderMode::Sandboxed,
                markup: sandbox_frame(&document),
                document: Some(document),
                links: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_always_sandboxes() {
        for css in ["", "p{color:red}"] {
            let view = render_page(&ContentParts::new("<p>x</p>", css, "go()"));
            assert_eq!(view.mode, RenderMode::Sandboxed);
            assert!(view.markup.starts_with("<iframe"));
            assert!(view.document.is_some());
        }
    }

    #[test]
    fn no_script_never_sandboxes() {
        for css in ["", "p{color:red}"] {
            for js in ["", "   \n"] {
                let view = render_page(&ContentParts::new("<p>x</p>", css, js));
                assert_eq!(view.mode, RenderMode::Inline);
                assert!(view.document.is_none());
            }
        }
    }

    #[test]
    fn inline_lifts_and_scopes_styles() {
        let parts = ContentParts::new("<style>h1{x:y}</style><h1>T</h1>", "p{a:b}", "");
        let view = render_page(&parts);
        assert_eq!(
            view.markup,
            "<div class=\"altnet-page\"><style>.altnet-page h1 {x:y} .altnet-page p {a:b}</style><h1>T</h1></div>"
        );
    }

    #[test]
    fn inline_without_css_has_no_style_block() {
        let view = render_page(&ContentParts::html_only("<p>x</p>"));
        assert_eq!(view.markup, "<div class=\"altnet-page\"><p>x</p></div>");
    }

    #[test]
    fn inline_collects_links() {
        let view = render_page(&ContentParts::html_only(
            r#"<a href="altnet://a">A</a> <a href="b">B</a>"#,
        ));
        assert_eq!(view.links, vec!["altnet://a", "b"]);
    }

    #[test]
    fn sandboxed_document_carries_scoped_css() {
        let view = render_page(&ContentParts::new("<p>x</p>", ".card{}", "go()"));
        let doc = view.document.unwrap();
        assert!(doc.contains(".altnet-page .card {}"));
        assert!(doc.contains("try{go()"));
    }
}

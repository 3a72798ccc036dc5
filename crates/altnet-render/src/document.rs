//! Assembly of the self-contained document loaded into the isolated frame.

use std::sync::LazyLock;

use altnet_content::html::escape_attr;
use altnet_content::NAMESPACE_CLASS;
use regex::Regex;

use crate::bridge::BRIDGE_SCRIPT;

/// Stylesheet every isolated document starts from, before the page's own css.
pub const BASE_STYLESHEET: &str = concat!(
    ":root{--bg:#1a1a1a;--text:#e0e0e0;--accent:#e8a0bf;--border:#333;--surface:#242424;--surface2:#2a2a2a;--text-dim:#888}",
    "body{background:var(--bg);color:var(--text);font-family:'Ubuntu Condensed','Segoe UI',system-ui,sans-serif;line-height:1.7;padding:24px;margin:0}",
    "a{color:var(--accent);text-decoration:none;cursor:pointer}",
    "a:hover{color:#f0b8d0;border-bottom:1px solid #f0b8d0}",
    "img{max-width:100%;border-radius:8px;border:1px solid var(--border)}",
    "blockquote{border-left:3px solid var(--accent);padding:8px 16px;margin:14px 0;background:var(--surface);border-radius:0 6px 6px 0}",
    "table{width:100%;border-collapse:collapse}th,td{border:1px solid var(--border);padding:8px 12px;text-align:left}th{background:var(--surface2);font-weight:600}",
    "code{background:var(--surface2);padding:2px 6px;border-radius:4px;font-family:'SF Mono','Fira Code',monospace;font-size:13px}",
    "pre{background:var(--surface);border:1px solid var(--border);border-radius:8px;padding:16px;overflow-x:auto}pre code{background:none;padding:0}",
    "hr{border:none;border-top:1px solid var(--border);margin:24px 0}",
    ".image-placeholder{padding:24px;border:1px dashed var(--border);border-radius:8px;color:var(--text-dim)}",
);

const FRAME_STYLE: &str = "width:100%;border:none;min-height:400px;display:block;";

static SCRIPT_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

/// Rewrite any `</script` so embedded source cannot close its element.
pub fn neutralize_script_close(js: &str) -> String {
    SCRIPT_CLOSE.replace_all(js, r"<\/$1").into_owned()
}

/// Full document for the isolated frame: base stylesheet, page css, markup,
/// then the bridge script followed by the author's script inside try/catch.
pub fn sandbox_document(html: &str, scoped_css: &str, js: &str) -> String {
    let mut doc = String::with_capacity(html.len() + scoped_css.len() + js.len() + 2048);
    doc.push_str("<!DOCTYPE html><html><head>");
    doc.push_str(r#"<meta charset="UTF-8"><meta name="viewport" content="width=device-width,initial-scale=1.0">"#);
    doc.push_str("<style>");
    doc.push_str(BASE_STYLESHEET);
    doc.push_str("</style><style>");
    doc.push_str(&neutralize_style_close(scoped_css));
    doc.push_str("</style></head>");
    doc.push_str(&format!(r#"<body class="{NAMESPACE_CLASS}">"#));
    doc.push_str(html);
    doc.push_str("<script>");
    doc.push_str(BRIDGE_SCRIPT);
    doc.push_str("</script><script>try{");
    doc.push_str(&neutralize_script_close(js));
    doc.push_str("\n}catch(e){console.error(\"[altnet page]\",e);}</script>");
    doc.push_str("</body></html>");
    doc
}

/// Frame element carrying `document` with scripts enabled and no same-origin
/// access.
pub fn sandbox_frame(document: &str) -> String {
    format!(
        r#"<iframe sandbox="allow-scripts" style="{FRAME_STYLE}" srcdoc="{}"></iframe>"#,
        escape_attr(document)
    )
}

/// Standalone host page for a rendered view, used when writing pages to disk.
///
/// For framed pages a small listener applies `resize` messages to the frame
/// and reports `navigate` targets through the location hash.
pub fn host_page(title: &str, body: &str, framed: bool) -> String {
    let listener = if framed {
        concat!(
            "<script>window.addEventListener(\"message\",function(e){",
            "var d=e.data||{};var f=document.querySelector(\"iframe\");",
            "if(d.type===\"resize\"&&typeof d.height===\"number\"&&isFinite(d.height)&&d.height>=0&&f){f.style.height=d.height+\"px\";}",
            "else if(d.type===\"navigate\"&&typeof d.href===\"string\"){location.hash=d.href.replace(/^(altnet|alt):\\/\\//i,\"\");}",
            "});</script>"
        )
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{}</title><style>{BASE_STYLESHEET}</style></head><body>{body}{listener}</body></html>",
        altnet_content::html::escape_text(title)
    )
}

fn neutralize_style_close(css: &str) -> String {
    css.replace("</style", "<\\/style").replace("</STYLE", "<\\/STYLE")
}

//! Generated image slots.
//!
//! The generator describes images as `<img data-ai-prompt="...">`. Each one is
//! swapped for a numbered placeholder, then up to the per-page limit are
//! resolved through the asset collaborator. Every placeholder ends up either
//! as an image or as a failure marker.

use std::sync::LazyLock;
use std::time::Duration;

use altnet_content::html::{escape_attr, escape_text, truncate_chars};
use altnet_core::AssetResolver;
use futures::future::join_all;
use regex::{Captures, Regex};
use tracing::{debug, warn};

/// Lowest and highest number of images resolved for one page.
pub const MIN_IMAGES_PER_PAGE: usize = 1;
pub const MAX_IMAGES_PER_PAGE: usize = 3;

const PLACEHOLDER_PROMPT_CHARS: usize = 80;
pub const FAILURE_TEXT: &str = "[Image failed to load]";

static PROMPTED_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*?\bdata-ai-prompt="([^"]+)"[^>]*>"#).unwrap());
static PENDING_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="image-placeholder" id="(ai-img-\d+)">Generating image: "(.+?)\.{3}"</div>"#).unwrap()
});

/// One image slot awaiting resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePrompt {
    pub id: String,
    pub prompt: String,
}

/// Replace prompted image tags with numbered placeholders.
pub fn insert_placeholders(html: &str) -> (String, Vec<ImagePrompt>) {
    let mut prompts = Vec::new();
    let replaced = PROMPTED_IMG.replace_all(html, |caps: &Captures<'_>| {
        let id = format!("ai-img-{}", prompts.len());
        let prompt = unescape(&caps[1]);
        let markup = placeholder(&id, &prompt);
        prompts.push(ImagePrompt { id, prompt });
        markup
    });
    (replaced.into_owned(), prompts)
}

/// Placeholders left pending in restored content, with their prompts parsed
/// back from the placeholder text.
pub fn recover_pending(html: &str) -> Vec<ImagePrompt> {
    PENDING_PLACEHOLDER
        .captures_iter(html)
        .map(|caps| ImagePrompt {
            id: caps[1].to_string(),
            prompt: unescape(&caps[2]),
        })
        .collect()
}

fn placeholder(id: &str, prompt: &str) -> String {
    format!(
        r#"<div class="image-placeholder" id="{id}">Generating image: "{}..."</div>"#,
        escape_text(truncate_chars(prompt, PLACEHOLDER_PROMPT_CHARS))
    )
}

fn failure_marker(id: &str) -> String {
    format!(r#"<div class="image-placeholder image-failed" id="{id}">{FAILURE_TEXT}</div>"#)
}

fn image_tag(prompt: &str, src: &str) -> String {
    format!(
        r#"<img class="page-image" alt="{}" src="{}" />"#,
        escape_attr(prompt),
        escape_attr(src)
    )
}

fn replace_slot(html: &str, id: &str, markup: &str) -> String {
    let pattern = format!(r#"<div class="image-placeholder" id="{}">[^<]*</div>"#, regex::escape(id));
    match Regex::new(&pattern) {
        Ok(re) => re.replace(html, regex::NoExpand(markup)).into_owned(),
        Err(_) => html.to_string(),
    }
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Outcome counts of one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub resolved: usize,
    pub failed: usize,
}

/// Resolve up to `limit` of `prompts` concurrently, each under `timeout`.
///
/// Resolved slots become images; failed, timed-out and over-limit slots
/// become failure markers.
pub async fn resolve_images(
    html: &str,
    prompts: &[ImagePrompt],
    resolver: &dyn AssetResolver,
    limit: usize,
    timeout: Duration,
) -> (String, ImageStats) {
    let limit = limit.clamp(MIN_IMAGES_PER_PAGE, MAX_IMAGES_PER_PAGE);
    let (attempted, skipped) = prompts.split_at(limit.min(prompts.len()));

    let results = join_all(attempted.iter().map(|p| async move {
        match tokio::time::timeout(timeout, resolver.resolve(&p.prompt)).await {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                warn!(id = %p.id, error = %e, kind = e.error_kind(), "image resolution failed");
                None
            }
            Err(_) => {
                warn!(id = %p.id, timeout_ms = timeout.as_millis() as u64, "image resolution timed out");
                None
            }
        }
    }))
    .await;

    let mut out = html.to_string();
    let mut stats = ImageStats::default();
    for (prompt, result) in attempted.iter().zip(results) {
        let markup = match result {
            Some(url) => {
                stats.resolved += 1;
                image_tag(&prompt.prompt, &url)
            }
            None => {
                stats.failed += 1;
                failure_marker(&prompt.id)
            }
        };
        out = replace_slot(&out, &prompt.id, &markup);
    }
    for prompt in skipped {
        stats.failed += 1;
        out = replace_slot(&out, &prompt.id, &failure_marker(&prompt.id));
    }
    debug!(resolved = stats.resolved, failed = stats.failed, "image slots settled");
    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use altnet_core::CollaboratorError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AssetResolver for Echo {
        async fn resolve(&self, prompt: &str) -> Result<String, CollaboratorError> {
            if prompt.contains("broken") {
                return Err(CollaboratorError::NetworkError("down".into()));
            }
            if prompt.contains("slow") {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            Ok(format!("https://img.test/{}", prompt.replace(' ', "-")))
        }
    }

    #[test]
    fn placeholders_are_numbered() {
        let html = r#"<p>a</p><img data-ai-prompt="a red fox" alt="fox" /><IMG alt="x" data-ai-prompt="blue sky">"#;
        let (out, prompts) = insert_placeholders(html);
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], ImagePrompt { id: "ai-img-0".into(), prompt: "a red fox".into() });
        assert_eq!(prompts[1].prompt, "blue sky");
        assert!(out.contains(r#"<div class="image-placeholder" id="ai-img-0">Generating image: "a red fox..."</div>"#));
        assert!(!out.contains("data-ai-prompt"));
    }

    #[test]
    fn plain_images_are_untouched() {
        let html = r#"<img src="x.png">"#;
        let (out, prompts) = insert_placeholders(html);
        assert_eq!(out, html);
        assert!(prompts.is_empty());
    }

    #[test]
    fn pending_placeholders_are_recovered() {
        let (html, prompts) = insert_placeholders(r#"<img data-ai-prompt="a &quot;quoted&quot; cat">"#);
        let recovered = recover_pending(&html);
        assert_eq!(recovered, prompts);
        assert_eq!(recovered[0].prompt, "a \"quoted\" cat");
    }

    #[test]
    fn long_prompts_recover_truncated() {
        let long = "x".repeat(120);
        let (html, _) = insert_placeholders(&format!(r#"<img data-ai-prompt="{long}">"#));
        assert_eq!(recover_pending(&html)[0].prompt.len(), 80);
    }

    #[tokio::test]
    async fn resolves_within_limit_and_marks_the_rest() {
        let (html, prompts) = insert_placeholders(
            r#"<img data-ai-prompt="one"><img data-ai-prompt="two"><img data-ai-prompt="three">"#,
        );
        let (out, stats) = resolve_images(&html, &prompts, &Echo, 2, Duration::from_secs(60)).await;
        assert_eq!(stats, ImageStats { resolved: 2, failed: 1 });
        assert!(out.contains(r#"<img class="page-image" alt="one" src="https://img.test/one" />"#));
        assert!(out.contains(r#"src="https://img.test/two""#));
        assert!(out.contains(r#"id="ai-img-2">[Image failed to load]</div>"#));
        assert!(!out.contains("Generating image"));
    }

    #[tokio::test]
    async fn failures_become_markers() {
        let (html, prompts) = insert_placeholders(r#"<img data-ai-prompt="broken link">"#);
        let (out, stats) = resolve_images(&html, &prompts, &Echo, 3, Duration::from_secs(60)).await;
        assert_eq!(stats, ImageStats { resolved: 0, failed: 1 });
        assert!(out.contains(FAILURE_TEXT));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_resolution_times_out() {
        let (html, prompts) = insert_placeholders(r#"<img data-ai-prompt="slow river"><img data-ai-prompt="fast">"#);
        let (out, stats) = resolve_images(&html, &prompts, &Echo, 3, Duration::from_secs(60)).await;
        assert_eq!(stats, ImageStats { resolved: 1, failed: 1 });
        assert!(out.contains(r#"id="ai-img-0">[Image failed to load]"#));
        assert!(out.contains("https://img.test/fast"));
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let (html, prompts) = insert_placeholders(
            &(0..5).map(|i| format!(r#"<img data-ai-prompt="p{i}">"#)).collect::<String>(),
        );
        let (_, stats) = resolve_images(&html, &prompts, &Echo, 10, Duration::from_secs(60)).await;
        assert_eq!(stats, ImageStats { resolved: 3, failed: 2 });
        let (_, stats) = resolve_images(&html, &prompts, &Echo, 0, Duration::from_secs(60)).await;
        assert_eq!(stats, ImageStats { resolved: 1, failed: 4 });
    }
}

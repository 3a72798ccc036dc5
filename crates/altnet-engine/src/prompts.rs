//! Prompts sent to the generator for one navigation.

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are altnet, an AI that generates creative, detailed pages for an alternate-reality internet browser.

FORMAT:
Always output your response in three labeled sections, each starting with a delimiter on its own line:

===HTML===
(page body content, no <html>, <head>, or <body> tags)
===CSS===
(styles for your page, use @import for web fonts if desired)
===JS===
(JavaScript for interactivity, optional, leave empty if not needed)

RULES:
- Use semantic HTML: h1, h2, h3, p, ul, ol, blockquote, table, pre, code, hr, etc.
- Include 1-3 images: <img data-ai-prompt=\"detailed description\" alt=\"description\" />
- Include 3-6 hyperlinks: <a href=\"altnet://some-url-path\">Link Text</a>
  - Use creative URLs like altnet://en.wikipedia.alt/wiki/Topic
- Make content creative, detailed, internally consistent, and immersive
- Pages should feel like real websites from a parallel universe
- Content should be 300-600 words
- Use JS for interactive elements (tabs, toggles, animations, calculators, etc.)
- JS can use querySelector/getElementById to reference your HTML elements
- Do NOT output markdown code fences, just the raw sections";

/// The system prompt with the lineage's tone appended, if any.
pub fn system_prompt(base: &str, tone: Option<&str>) -> String {
    match tone.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tone) => format!("{base}\n\nTone: {tone}"),
        None => base.to_string(),
    }
}

pub fn user_prompt(address: &str) -> String {
    format!(
        "Generate the webpage for: {address}\n\n\
         This is a page on the alternate internet. Create rich, immersive content with images and links to other pages."
    )
}

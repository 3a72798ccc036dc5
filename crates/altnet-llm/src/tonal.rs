//! Tonal modifiers: a short mood phrase chosen once per lineage.

/// Instruction for the tonal-modifier call.
pub const TONAL_SYSTEM_PROMPT: &str = "You generate tonal modifiers for creative writing. \
A tonal modifier is a short phrase (3-8 words) describing a mood, disposition, or emotional texture, \
not a theme, topic, or scenario. Examples: \"wistful and slightly amused\", \"quietly conspiratorial\", \
\"warm but formally distant\", \"dreamlike with sharp edges\". \
Respond with ONLY the phrase, no quotes, no punctuation at the end, no explanation.";

const MAX_CHARS: usize = 80;

/// Strip surrounding quotes and one trailing `.` or `!`, cap at 80
/// characters. Empty results are `None`.
pub fn clean_tonal_modifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    let unquoted = unquoted.strip_suffix(['"', '\'']).unwrap_or(unquoted);
    let unpunctuated = unquoted.strip_suffix(['.', '!']).unwrap_or(unquoted);

    let cleaned: String = unpunctuated.chars().take(MAX_CHARS).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_trailing_punctuation() {
        assert_eq!(clean_tonal_modifier("\"quietly conspiratorial\"").as_deref(), Some("quietly conspiratorial"));
        assert_eq!(clean_tonal_modifier("'dreamlike with sharp edges!'").as_deref(), Some("dreamlike with sharp edges"));
        assert_eq!(clean_tonal_modifier("  warm but formally distant.\n").as_deref(), Some("warm but formally distant"));
    }

    #[test]
    fn only_one_trailing_mark_is_removed() {
        assert_eq!(clean_tonal_modifier("hushed...").as_deref(), Some("hushed.."));
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(200);
        assert_eq!(clean_tonal_modifier(&long).unwrap().len(), 80);
    }

    #[test]
    fn empty_is_none() {
        assert!(clean_tonal_modifier("").is_none());
        assert!(clean_tonal_modifier("\"\"").is_none());
        assert!(clean_tonal_modifier("  .  ").is_none());
    }
}

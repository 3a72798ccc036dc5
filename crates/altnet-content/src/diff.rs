//! Approximate novelty between a page and the page it was reached from.

use std::collections::HashSet;

use crate::html::{plain_text, select_texts, truncate_chars};
use crate::packed::unpack_content;

/// Longest concept kept, in characters.
pub const CONCEPT_MAX_CHARS: usize = 60;
/// Most concepts returned for one node.
pub const MAX_CONCEPTS: usize = 8;

/// Concept categories in output order, each with the minimum text length
/// (exclusive) an entry needs.
const CONCEPT_CATEGORIES: &[(&str, usize)] = &[("h1, h2, h3", 0), ("a", 3), ("strong, b", 3)];

fn words(raw: &str) -> Vec<String> {
    let html = unpack_content(raw).html;
    plain_text(&html)
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Number of child words (repeats counted) that never occur in the parent.
pub fn compute_content_delta(parent_raw: &str, child_raw: &str) -> usize {
    let parent: HashSet<String> = words(parent_raw).into_iter().collect();
    words(child_raw)
        .iter()
        .filter(|w| !parent.contains(*w))
        .count()
}

/// Headings, link text and bold text that appear in the child but not in the
/// same category of the parent. At most eight entries of sixty characters.
pub fn extract_new_concepts(parent_raw: &str, child_raw: &str) -> Vec<String> {
    let parent_html = unpack_content(parent_raw).html;
    let child_html = unpack_content(child_raw).html;

    let mut seen: HashSet<String> = HashSet::new();
    let mut concepts = Vec::new();

    for (selector, min_chars) in CONCEPT_CATEGORIES {
        let known: HashSet<String> = select_texts(&parent_html, selector)
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();

        for text in select_texts(&child_html, selector) {
            if text.chars().count() <= *min_chars || known.contains(&text.to_lowercase()) {
                continue;
            }
            let entry = truncate_chars(&text, CONCEPT_MAX_CHARS).to_string();
            if seen.insert(entry.to_lowercase()) {
                concepts.push(entry);
                if concepts.len() == MAX_CONCEPTS {
                    return concepts;
                }
            }
        }
    }
    concepts
}

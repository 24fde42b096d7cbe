//! String and token-set similarity measures used by matching and inference.

use atlas_core::record::RawRecord;
use std::collections::BTreeSet;

/// Author strings that carry no identity signal.
const PLACEHOLDER_AUTHORS: [&str; 6] = ["unknown", "n/a", "none", "anonymous", "various", "community"];

/// Normalize a name for comparison: lowercase, strip punctuation, collapse
/// whitespace, and drop the `mcp`/`server` boilerplate most registry entries
/// carry ("mcp-time-server" and "Time Server" both reduce to "time").
pub fn normalize_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut last_space = true;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch);
            last_space = false;
        } else if !last_space {
            cleaned.push(' ');
            last_space = true;
        }
    }
    let mut cleaned = cleaned.trim().to_string();

    if let Some(rest) = cleaned.strip_prefix("mcp ") {
        cleaned = rest.to_string();
    }
    for suffix in [" mcp server", " server", " mcp"] {
        if let Some(rest) = cleaned.strip_suffix(suffix) {
            cleaned = rest.to_string();
            break;
        }
    }
    cleaned
}

/// Case-insensitive author equality check that rejects placeholder values.
pub fn authors_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = a.trim().to_lowercase();
            let b = b.trim().to_lowercase();
            !a.is_empty() && !is_placeholder_author(&a) && a == b
        }
        _ => false,
    }
}

/// True for authors that should never drive a match ("unknown", empty, ...).
pub fn is_placeholder_author(author: &str) -> bool {
    let author = author.trim().to_lowercase();
    author.is_empty() || PLACEHOLDER_AUTHORS.contains(&author.as_str())
}

/// Tokenize a string into a lowercase word set.
pub fn token_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity between two token sets.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 { 0.0 } else { intersection / union }
}

/// Fuzzy name similarity: the stronger of normalized edit distance and
/// token-set overlap over normalized names. Catches both misspellings
/// ("playwrigth") and reorderings ("server time" / "time server").
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize_name(a), normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let edit = strsim::normalized_levenshtein(&a, &b);
    let tokens = jaccard(&token_set(&a), &token_set(&b));
    edit.max(tokens)
}

/// The combined description + category + tool-name token set a record
/// exposes for content matching.
pub fn content_tokens(record: &RawRecord) -> BTreeSet<String> {
    let mut tokens = token_set(record.description.as_deref().unwrap_or(""));
    for category in &record.categories {
        tokens.insert(category.as_str().to_string());
    }
    for tool in &record.tools {
        tokens.extend(token_set(&tool.name));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_registry_boilerplate() {
        assert_eq!(normalize_name("mcp-time-server"), "time");
        assert_eq!(normalize_name("Time Server"), "time");
        assert_eq!(normalize_name("playwright_mcp"), "playwright");
    }

    #[test]
    fn similar_names_score_above_threshold() {
        assert!(name_similarity("time-server", "Time Server") >= 0.85);
        assert!(name_similarity("playwright-mcp", "Playwright MCP Server") >= 0.85);
        assert!(name_similarity("time-server", "weather-api") < 0.85);
    }

    #[test]
    fn placeholder_authors_never_match() {
        assert!(!authors_match(Some("unknown"), Some("unknown")));
        assert!(!authors_match(Some(""), Some("")));
        assert!(!authors_match(Some("acme"), None));
        assert!(authors_match(Some("Microsoft"), Some("microsoft")));
    }

    #[test]
    fn jaccard_handles_empty_sets() {
        let empty = BTreeSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert_eq!(jaccard(&token_set("a b"), &token_set("a b")), 1.0);
    }
}

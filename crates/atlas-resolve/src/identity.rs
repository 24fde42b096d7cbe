//! Deterministic GlobalID derivation.
//!
//! A GlobalID is a pure function of a record's identifying fields: the same
//! record yields the same ID on every call, and the same logical server
//! discovered on different registries yields the same ID whenever it is
//! derivable from repository, author, or name.

use atlas_core::error::UnidentifiableRecord;
use atlas_core::record::RawRecord;
use sha2::{Digest, Sha256};

/// Maximum GlobalID length; overlong IDs keep a prefix plus a hash tail.
const MAX_ID_LEN: usize = 100;
const ID_PREFIX_LEN: usize = 80;
const CONTENT_HASH_LEN: usize = 12;

/// Forges whose URL paths follow the `host/owner/repo` convention.
const KNOWN_FORGES: [&str; 4] = [
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
];

/// Which derivation tier produced an ID. Lower tiers are more stable; the
/// resolver prefers them when picking a canonical ID for a merged group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdTier {
    Repository,
    AuthorName,
    Name,
    ContentHash,
}

/// A derived GlobalID together with its derivation tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalId {
    pub id: String,
    pub tier: IdTier,
}

/// Derive the GlobalID for a record. Priority-ordered; an empty
/// normalization at any tier falls through to the next.
pub fn derive_global_id(record: &RawRecord) -> Result<GlobalId, UnidentifiableRecord> {
    // Tier 1: repository URL → owner/repo
    if let Some(url) = record.repository_url.as_deref()
        && let Some(repo_id) = extract_repository_id(url)
    {
        let id = normalize_id(&repo_id);
        if !id.is_empty() {
            return Ok(GlobalId {
                id,
                tier: IdTier::Repository,
            });
        }
    }

    // Tier 2: author + name
    if let (Some(author), name) = (record.author.as_deref(), record.name.as_str())
        && !author.trim().is_empty()
        && !name.trim().is_empty()
    {
        let id = normalize_id(&format!("{author}/{name}"));
        if !id.is_empty() {
            return Ok(GlobalId {
                id,
                tier: IdTier::AuthorName,
            });
        }
    }

    // Tier 3: name alone
    let id = normalize_id(&record.name);
    if !id.is_empty() {
        return Ok(GlobalId {
            id,
            tier: IdTier::Name,
        });
    }

    // Tier 4: content hash over normalized description + source fields
    if let Some(hash) = content_hash(record) {
        return Ok(GlobalId {
            id: format!("server-{hash}"),
            tier: IdTier::ContentHash,
        });
    }

    Err(UnidentifiableRecord {
        registry: record.source_registry,
        source_id: record.source_id.clone(),
        name: record.name.clone(),
    })
}

/// Extract `owner/repo` from a repository URL.
///
/// Handles full URLs on known forges (`https://github.com/owner/repo.git`)
/// as well as the bare `owner/repo` form some registries emit.
pub fn extract_repository_id(url: &str) -> Option<String> {
    let mut url = url.trim().to_lowercase();
    for prefix in ["https://", "http://", "git@"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            url = rest.to_string();
        }
    }
    if let Some(rest) = url.strip_prefix("www.") {
        url = rest.to_string();
    }
    let url = url.trim_end_matches('/');

    let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();

    if KNOWN_FORGES.iter().any(|forge| parts.first() == Some(forge)) {
        if parts.len() >= 3 {
            let owner = parts[1];
            let repo = parts[2].trim_end_matches(".git");
            return Some(format!("{owner}/{repo}"));
        }
        return None;
    }

    // Bare owner/repo with no host component.
    if parts.len() == 2 && !parts[0].contains('.') {
        let repo = parts[1].trim_end_matches(".git");
        return Some(format!("{}/{repo}", parts[0]));
    }

    None
}

/// Normalize a repository URL to its `host/path` form for equality checks
/// across registries (strip protocol, `www.`, trailing slash, `.git`).
pub fn normalize_repository_url(url: &str) -> Option<String> {
    let mut url = url.trim().to_lowercase();
    for prefix in ["https://", "http://", "git@"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            url = rest.to_string();
        }
    }
    if let Some(rest) = url.strip_prefix("www.") {
        url = rest.to_string();
    }
    let url = url.trim_end_matches('/').trim_end_matches(".git");
    if url.is_empty() {
        return None;
    }
    Some(url.to_string())
}

/// Normalize a raw ID: lowercase, separators to hyphens, keep only
/// `[a-z0-9-/]`, collapse runs, clamp length.
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_hyphen = false;

    for ch in raw.trim().to_lowercase().chars() {
        match ch {
            'a'..='z' | '0'..='9' | '/' => {
                out.push(ch);
                last_hyphen = false;
            }
            _ => {
                if !last_hyphen && !out.is_empty() {
                    out.push('-');
                }
                last_hyphen = true;
            }
        }
    }

    let out = out.trim_matches('-').to_string();
    // Tidy hyphens around path separators ("a-/b" → "a/b")
    let out = out.replace("-/", "/").replace("/-", "/");

    if out.len() > MAX_ID_LEN {
        let tail = short_hash(&out[ID_PREFIX_LEN..], 8);
        let mut clamped = out[..ID_PREFIX_LEN].trim_end_matches('-').to_string();
        clamped.push('-');
        clamped.push_str(&tail);
        return clamped;
    }
    out
}

/// Last-resort content hash: normalized description plus source fields and
/// sorted tool names. Returns None when there is nothing to hash.
fn content_hash(record: &RawRecord) -> Option<String> {
    let description = record
        .description
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    let mut tool_names: Vec<&str> = record.tools.iter().map(|t| t.name.as_str()).collect();
    tool_names.sort_unstable();

    if description.is_empty() && tool_names.is_empty() && record.source_id.trim().is_empty() {
        return None;
    }

    let prefix: String = description.chars().take(100).collect();
    let input = format!(
        "{}|{}|{}|{}",
        prefix,
        record.source_registry,
        record.source_id.trim().to_lowercase(),
        tool_names.join(","),
    );
    Some(short_hash(&input, CONTENT_HASH_LEN))
}

fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::record::RegistrySource;

    #[test]
    fn repository_url_forms_agree() {
        for url in [
            "https://github.com/microsoft/playwright-mcp",
            "https://github.com/Microsoft/Playwright-MCP.git",
            "http://www.github.com/microsoft/playwright-mcp/",
            "microsoft/playwright-mcp",
        ] {
            assert_eq!(
                extract_repository_id(url).as_deref(),
                Some("microsoft/playwright-mcp"),
                "url: {url}"
            );
        }
    }

    #[test]
    fn unknown_host_is_not_a_repository_id() {
        assert_eq!(extract_repository_id("https://example.com/a/b"), None);
    }

    #[test]
    fn derivation_is_pure() {
        let mut record = RawRecord::new(RegistrySource::Github, "ms/pw", "playwright-mcp");
        record.repository_url = Some("https://github.com/microsoft/playwright-mcp".into());
        let a = derive_global_id(&record).unwrap();
        let b = derive_global_id(&record).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, "microsoft/playwright-mcp");
        assert_eq!(a.tier, IdTier::Repository);
    }

    #[test]
    fn name_tier_normalizes_spacing_and_case() {
        let record = RawRecord::new(RegistrySource::Glama, "t1", "Time Server");
        let id = derive_global_id(&record).unwrap();
        assert_eq!(id.id, "time-server");
        assert_eq!(id.tier, IdTier::Name);
    }

    #[test]
    fn author_name_tier_beats_name_tier() {
        let mut record = RawRecord::new(RegistrySource::McpSo, "42", "cairo coder");
        record.author = Some("kasarlabs".into());
        let id = derive_global_id(&record).unwrap();
        assert_eq!(id.id, "kasarlabs/cairo-coder");
        assert_eq!(id.tier, IdTier::AuthorName);
    }

    #[test]
    fn content_hash_is_last_resort() {
        let mut record = RawRecord::new(RegistrySource::Glama, "abc123", "");
        record.description = Some("Simple time server".into());
        let id = derive_global_id(&record).unwrap();
        assert!(id.id.starts_with("server-"));
        assert_eq!(id.id.len(), "server-".len() + 12);
        assert_eq!(id.tier, IdTier::ContentHash);
    }

    #[test]
    fn blank_record_is_rejected() {
        let record = RawRecord::new(RegistrySource::Glama, "", "");
        assert!(derive_global_id(&record).is_err());
    }

    #[test]
    fn overlong_ids_are_clamped_with_hash_tail() {
        let long = "x".repeat(200);
        let id = normalize_id(&long);
        assert_eq!(id.len(), ID_PREFIX_LEN + 1 + 8);
        assert!(id.len() <= MAX_ID_LEN);
    }
}

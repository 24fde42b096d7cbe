//! Content checksums over canonicalized record fields.

use atlas_core::record::RawRecord;
use sha2::{Digest, Sha256};

/// Unit separator keeps field boundaries unambiguous in the digest input.
const SEP: &str = "\u{1f}";

/// Length of the hex-encoded, truncated digest (64 bits).
const CHECKSUM_LEN: usize = 16;

/// Compute the content checksum for a record.
///
/// The digest covers every identifying and content field but deliberately
/// excludes `fetched_at`: re-fetching identical data must produce an
/// identical checksum, or change detection would never skip anything.
pub fn record_checksum(record: &RawRecord) -> String {
    let mut hasher = Sha256::new();

    let mut feed = |part: &str| {
        hasher.update(part.as_bytes());
        hasher.update(SEP.as_bytes());
    };

    feed(record.source_registry.as_str());
    feed(&record.source_id);
    feed(record.name.trim());
    feed(record.description.as_deref().unwrap_or("").trim());
    feed(record.author.as_deref().unwrap_or("").trim());
    feed(record.repository_url.as_deref().unwrap_or("").trim());

    let mut categories: Vec<&str> = record.categories.iter().map(|c| c.as_str()).collect();
    categories.sort_unstable();
    feed(&categories.join(","));

    let mut operations: Vec<&str> = record.operations.iter().map(|o| o.as_str()).collect();
    operations.sort_unstable();
    feed(&operations.join(","));

    let mut tools: Vec<&str> = record.tools.iter().map(|t| t.name.as_str()).collect();
    tools.sort_unstable();
    feed(&tools.join(","));

    feed(&record.popularity_score.map_or(String::new(), |n| n.to_string()));
    feed(&record.download_count.map_or(String::new(), |n| n.to_string()));
    feed(record.language.as_deref().unwrap_or(""));
    feed(record.version.as_deref().unwrap_or(""));
    feed(record.license.as_deref().unwrap_or(""));
    feed(record.homepage.as_deref().unwrap_or(""));

    let digest = hasher.finalize();
    hex::encode(digest)[..CHECKSUM_LEN].to_string()
}

/// Checksum of a whole snapshot: digest over its sorted item checksums.
pub fn snapshot_checksum(item_checksums: &[String]) -> String {
    let mut sorted = item_checksums.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for c in &sorted {
        hasher.update(c.as_bytes());
        hasher.update(SEP.as_bytes());
    }
    hex::encode(hasher.finalize())[..CHECKSUM_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::record::{RawRecord, RegistrySource};
    use chrono::TimeZone;

    #[test]
    fn checksum_ignores_fetch_time() {
        let mut a = RawRecord::new(RegistrySource::Github, "x/y", "y");
        let mut b = a.clone();
        a.fetched_at = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        b.fetched_at = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(record_checksum(&a), record_checksum(&b));
    }

    #[test]
    fn checksum_sees_content_change() {
        let a = RawRecord::new(RegistrySource::Github, "x/y", "y");
        let mut b = a.clone();
        b.description = Some("a time server".to_string());
        assert_ne!(record_checksum(&a), record_checksum(&b));
    }

    #[test]
    fn checksum_is_order_insensitive_for_sets() {
        use atlas_core::record::ServerCategory;
        let mut a = RawRecord::new(RegistrySource::Glama, "t", "t");
        a.categories = vec![ServerCategory::Database, ServerCategory::Search];
        let mut b = a.clone();
        b.categories = vec![ServerCategory::Search, ServerCategory::Database];
        assert_eq!(record_checksum(&a), record_checksum(&b));
    }
}

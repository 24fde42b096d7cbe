//! Snapshot storage for raw registry captures.
//!
//! Each scrape run is persisted as an append-only, timestamped, checksummed
//! snapshot plus a manifest recording per-item checksums and change flags.
//! Snapshots are never mutated after write and are retained for audit/diff
//! until explicitly pruned.

pub mod checksum;
pub mod payload;
pub mod store;

pub use store::{Capture, Manifest, ManifestEntry, Snapshot, SnapshotStore};

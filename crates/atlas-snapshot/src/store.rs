//! Read/write registry snapshots on disk.
//!
//! Layout: `<data_dir>/registries/<registry>/snapshot_<ts>.json` plus a
//! sibling `manifest_<ts>.json` per run. Files are written to a temporary
//! name and renamed into place, so an interrupted run leaves only
//! fully-written snapshots behind; a snapshot without its manifest is
//! treated as incomplete and ignored.

use crate::checksum::{record_checksum, snapshot_checksum};
use crate::payload;
use anyhow::{Context, Result};
use atlas_core::config::StorageConfig;
use atlas_core::record::{RawRecord, RegistrySource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_PREFIX: &str = "snapshot_";
const MANIFEST_PREFIX: &str = "manifest_";

/// One registry run's captured records. Append-only; never mutated after
/// write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub registry: RegistrySource,
    pub captured_at: DateTime<Utc>,
    /// Digest over the sorted item checksums.
    pub checksum: String,
    pub records: Vec<RawRecord>,
}

/// Per-item accounting for one capture run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub registry: RegistrySource,
    pub captured_at: DateTime<Utc>,
    pub item_count: usize,
    pub items: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source_id: String,
    pub checksum: String,
    /// False when the checksum matched the previous complete snapshot.
    pub changed: bool,
    /// Updated on every capture, including unchanged records.
    pub last_seen: DateTime<Utc>,
}

/// Result of one capture: the persisted snapshot plus change accounting.
#[derive(Debug)]
pub struct Capture {
    pub snapshot: Snapshot,
    pub manifest: Manifest,
    pub changed: usize,
    pub unchanged: usize,
    /// Records present in the previous complete snapshot but absent now.
    pub removed: usize,
    pub path: PathBuf,
}

/// Persists timestamped, checksummed captures of raw records per registry.
#[derive(Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    compress: bool,
}

impl SnapshotStore {
    pub fn new(data_dir: &Path, storage: &StorageConfig) -> Self {
        Self {
            root: data_dir.join("registries"),
            compress: storage.compress,
        }
    }

    /// Directory holding one registry's snapshots.
    pub fn registry_dir(&self, registry: RegistrySource) -> PathBuf {
        self.root.join(registry.dir_name())
    }

    /// Capture one registry run: checksum every record, diff against the
    /// last complete snapshot, and persist snapshot + manifest.
    pub fn capture(
        &self,
        registry: RegistrySource,
        mut records: Vec<RawRecord>,
    ) -> Result<Capture> {
        let captured_at = Utc::now();

        // Previous checksums keyed by source_id, from the last complete run.
        let previous: HashMap<String, String> = match self.latest_manifest(registry)? {
            Some(manifest) => manifest
                .items
                .into_iter()
                .map(|e| (e.source_id, e.checksum))
                .collect(),
            None => HashMap::new(),
        };

        let mut items = Vec::with_capacity(records.len());
        let mut changed = 0usize;
        let mut unchanged = 0usize;

        for record in &mut records {
            record.checksum = record_checksum(record);
            let is_changed = previous.get(&record.source_id) != Some(&record.checksum);
            if is_changed {
                changed += 1;
            } else {
                unchanged += 1;
            }
            items.push(ManifestEntry {
                source_id: record.source_id.clone(),
                checksum: record.checksum.clone(),
                changed: is_changed,
                last_seen: captured_at,
            });
        }

        // Records that vanished from the registry are changes too; they
        // drive stale marking downstream.
        let current: std::collections::HashSet<&str> =
            items.iter().map(|e| e.source_id.as_str()).collect();
        let removed = previous
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .count();

        let item_checksums: Vec<String> = items.iter().map(|e| e.checksum.clone()).collect();
        let snapshot = Snapshot {
            registry,
            captured_at,
            checksum: snapshot_checksum(&item_checksums),
            records,
        };
        let manifest = Manifest {
            registry,
            captured_at,
            item_count: items.len(),
            items,
        };

        let dir = self.registry_dir(registry);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;

        // Nanosecond stamp: lexicographic order equals chronological order,
        // and back-to-back captures never collide on a filename.
        let stamp = captured_at.format("%Y%m%d_%H%M%S_%9f").to_string();
        let snapshot_path = dir.join(format!("{SNAPSHOT_PREFIX}{stamp}.json"));
        let manifest_path = dir.join(format!("{MANIFEST_PREFIX}{stamp}.json"));

        // Snapshot first, manifest last: a crash in between leaves a snapshot
        // without a manifest, which `latest()` skips as incomplete.
        payload::write_atomic(
            &snapshot_path,
            &serde_json::to_vec_pretty(&snapshot)?,
            self.compress,
        )?;
        payload::write_atomic(
            &manifest_path,
            &serde_json::to_vec_pretty(&manifest)?,
            self.compress,
        )?;

        tracing::info!(
            registry = %registry,
            total = manifest.item_count,
            changed,
            unchanged,
            removed,
            "captured snapshot"
        );

        Ok(Capture {
            snapshot,
            manifest,
            changed,
            unchanged,
            removed,
            path: snapshot_path,
        })
    }

    /// The most recent *complete* snapshot for a registry, if any.
    pub fn latest(&self, registry: RegistrySource) -> Result<Option<Snapshot>> {
        match self.latest_stamp(registry)? {
            Some(stamp) => {
                let path = self
                    .registry_dir(registry)
                    .join(format!("{SNAPSHOT_PREFIX}{stamp}.json"));
                Ok(Some(payload::read_json(&path)?))
            }
            None => Ok(None),
        }
    }

    /// The manifest paired with the most recent complete snapshot.
    pub fn latest_manifest(&self, registry: RegistrySource) -> Result<Option<Manifest>> {
        match self.latest_stamp(registry)? {
            Some(stamp) => {
                let path = self
                    .registry_dir(registry)
                    .join(format!("{MANIFEST_PREFIX}{stamp}.json"));
                Ok(Some(payload::read_json(&path)?))
            }
            None => Ok(None),
        }
    }

    /// Capture timestamp of the newest complete snapshot across registries.
    pub fn newest_capture_time(&self) -> Result<Option<DateTime<Utc>>> {
        let mut newest = None;
        for registry in RegistrySource::ALL {
            if let Some(manifest) = self.latest_manifest(registry)? {
                newest = match newest {
                    Some(t) if t >= manifest.captured_at => Some(t),
                    _ => Some(manifest.captured_at),
                };
            }
        }
        Ok(newest)
    }

    /// Merge the latest complete snapshot of every registry into one record
    /// set for resolution.
    pub fn load_all_latest(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for registry in RegistrySource::ALL {
            if let Some(snapshot) = self.latest(registry)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    /// Delete all but the `keep` most recent complete snapshot pairs per
    /// registry. Returns how many pairs were removed.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let mut removed = 0;
        for registry in RegistrySource::ALL {
            let mut stamps = self.complete_stamps(registry)?;
            // Newest first; lexicographic order matches chronological order.
            stamps.sort_unstable_by(|a, b| b.cmp(a));
            for stamp in stamps.iter().skip(keep) {
                let dir = self.registry_dir(registry);
                fs::remove_file(dir.join(format!("{SNAPSHOT_PREFIX}{stamp}.json")))?;
                fs::remove_file(dir.join(format!("{MANIFEST_PREFIX}{stamp}.json")))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Timestamps of complete snapshot pairs (both files present, no temp
    /// leftovers counted).
    fn complete_stamps(&self, registry: RegistrySource) -> Result<Vec<String>> {
        let dir = self.registry_dir(registry);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        let mut manifests = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list snapshot directory {}", dir.display()))?
        {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Some(stamp) = stem.strip_prefix(SNAPSHOT_PREFIX) {
                snapshots.push(stamp.to_string());
            } else if let Some(stamp) = stem.strip_prefix(MANIFEST_PREFIX) {
                manifests.push(stamp.to_string());
            }
        }

        snapshots.retain(|s| manifests.contains(s));
        Ok(snapshots)
    }

    fn latest_stamp(&self, registry: RegistrySource) -> Result<Option<String>> {
        let mut stamps = self.complete_stamps(registry)?;
        stamps.sort_unstable();
        Ok(stamps.pop())
    }
}

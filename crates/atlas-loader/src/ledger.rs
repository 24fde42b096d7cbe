//! Committed-load ledger for incremental mode.
//!
//! Records the per-entity checksum of the last successfully committed load.
//! Incremental runs diff against it and skip entities whose snapshot
//! checksums have not changed since.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LEDGER_FILE: &str = "load_ledger.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadLedger {
    pub updated_at: DateTime<Utc>,
    /// GlobalID → checksum over the entity's provenance checksums at the
    /// time it was last committed.
    pub checksums: BTreeMap<String, String>,
    #[serde(skip)]
    path: PathBuf,
}

impl LoadLedger {
    /// Load the ledger from `<data_dir>/load_ledger.json`, or start empty.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LEDGER_FILE);
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read ledger {}", path.display()))?;
            let mut ledger: LoadLedger = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse ledger {}", path.display()))?;
            ledger.path = path;
            Ok(ledger)
        } else {
            Ok(Self {
                updated_at: Utc::now(),
                checksums: BTreeMap::new(),
                path,
            })
        }
    }

    /// True when the entity's checksum differs from the last committed load.
    pub fn is_changed(&self, global_id: &str, checksum: &str) -> bool {
        self.checksums.get(global_id).map(String::as_str) != Some(checksum)
    }

    /// Record a committed entity.
    pub fn record(&mut self, global_id: &str, checksum: &str) {
        self.checksums
            .insert(global_id.to_string(), checksum.to_string());
    }

    pub fn clear(&mut self) {
        self.checksums.clear();
    }

    /// Persist the ledger. Called once per load, after all batches settle,
    /// so a crashed load re-sends at most one run's worth of entities.
    pub fn save(&mut self) -> Result<()> {
        self.updated_at = Utc::now();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write ledger {}", self.path.display()))?;
        Ok(())
    }
}

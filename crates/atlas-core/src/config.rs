//! Pipeline configuration.
//!
//! Load order: `<data_dir>/atlas.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub ingest: IngestConfig,
    pub resolution: ResolutionConfig,
    pub inference: InferenceConfig,
    pub loader: LoaderConfig,
    pub storage: StorageConfig,
}

/// Registry ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Registries to ingest; empty means all known registries.
    pub registries: Vec<String>,
    /// Per-registry fetch timeout. A timed-out registry is reported as a
    /// fetch failure and does not block the others.
    pub fetch_timeout_secs: u64,
}

/// Entity-resolution thresholds and merge policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum fuzzy name similarity for a same-author name match.
    pub fuzzy_name_threshold: f64,
    /// Minimum token-set similarity over description+category+tool sets.
    pub token_set_threshold: f64,
    /// Scalar merge tie-break among equally recent non-empty values: when
    /// true the longer string wins, when false the first-sorted value wins.
    pub prefer_detailed: bool,
}

/// Relationship-inference thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Popularity at or above which an entity counts as popular.
    pub popular_threshold: u64,
    /// Popularity at or below which an entity counts as niche.
    pub niche_threshold: u64,
}

/// Graph-store loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Entities/edges per bulk upsert.
    pub batch_size: usize,
    /// Retries per failed batch before it is recorded as failed.
    pub max_retries: usize,
    /// Base backoff between retries; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Maximum batches in flight at once.
    pub concurrency: usize,
    /// Graph store HTTP endpoint.
    pub uri: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Compress snapshot payloads with zstd before writing.
    /// Decompression on load is automatic (detected by magic bytes).
    pub compress: bool,
    /// Complete snapshots retained per registry when pruning.
    pub keep_snapshots: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            registries: Vec::new(),
            fetch_timeout_secs: 120,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            fuzzy_name_threshold: 0.85,
            token_set_threshold: 0.9,
            prefer_detailed: true,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            popular_threshold: 1000,
            niche_threshold: 50,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: None,
            password: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compress: false,
            keep_snapshots: 5,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl AtlasConfig {
    /// Load config from `<data_dir>/atlas.toml`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("atlas.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override(
            "ATLAS_FUZZY_NAME_THRESHOLD",
            &mut config.resolution.fuzzy_name_threshold,
        );
        env_override(
            "ATLAS_TOKEN_SET_THRESHOLD",
            &mut config.resolution.token_set_threshold,
        );
        env_override(
            "ATLAS_POPULAR_THRESHOLD",
            &mut config.inference.popular_threshold,
        );
        env_override(
            "ATLAS_NICHE_THRESHOLD",
            &mut config.inference.niche_threshold,
        );
        env_override("ATLAS_BATCH_SIZE", &mut config.loader.batch_size);
        env_override("ATLAS_LOADER_CONCURRENCY", &mut config.loader.concurrency);
        env_override("ATLAS_GRAPH_URI", &mut config.loader.uri);

        // Validate thresholds
        if !(0.0..=1.0).contains(&config.resolution.fuzzy_name_threshold)
            || !(0.0..=1.0).contains(&config.resolution.token_set_threshold)
        {
            anyhow::bail!(
                "similarity thresholds must be within [0, 1] (fuzzy: {}, token-set: {})",
                config.resolution.fuzzy_name_threshold,
                config.resolution.token_set_threshold,
            );
        }
        if config.inference.niche_threshold >= config.inference.popular_threshold {
            anyhow::bail!(
                "niche_threshold ({}) must be less than popular_threshold ({})",
                config.inference.niche_threshold,
                config.inference.popular_threshold,
            );
        }
        if config.loader.batch_size == 0 || config.loader.concurrency == 0 {
            anyhow::bail!("loader batch_size and concurrency must be non-zero");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AtlasConfig::default();
        assert_eq!(config.resolution.fuzzy_name_threshold, 0.85);
        assert_eq!(config.resolution.token_set_threshold, 0.9);
        assert!(config.resolution.prefer_detailed);
        assert_eq!(config.inference.popular_threshold, 1000);
        assert_eq!(config.inference.niche_threshold, 50);
        assert_eq!(config.loader.batch_size, 500);
        assert_eq!(config.loader.concurrency, 4);
        assert_eq!(config.storage.keep_snapshots, 5);
        assert!(config.ingest.registries.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[ingest]
registries = ["github", "glama"]

[resolution]
fuzzy_name_threshold = 0.9
prefer_detailed = false

[loader]
batch_size = 250
uri = "http://graph:7474"
"#;
        let config: AtlasConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ingest.registries, vec!["github", "glama"]);
        assert_eq!(config.resolution.fuzzy_name_threshold, 0.9);
        assert!(!config.resolution.prefer_detailed);
        assert_eq!(config.loader.batch_size, 250);
        assert_eq!(config.loader.uri, "http://graph:7474");
        // Defaults for unspecified fields
        assert_eq!(config.resolution.token_set_threshold, 0.9);
        assert_eq!(config.loader.max_retries, 3);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = AtlasConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.loader.batch_size, 500);
    }

    #[test]
    fn test_config_rejects_inverted_popularity_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("atlas.toml"),
            r#"
[inference]
popular_threshold = 10
niche_threshold = 100
"#,
        )
        .unwrap();

        assert!(AtlasConfig::load(tmp.path()).is_err());
    }
}

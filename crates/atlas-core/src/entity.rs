//! Canonical entities and the typed edges inferred between them.

use crate::record::{OperationType, RegistrySource, ServerCategory, ToolSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One source record's contribution to a canonical entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Provenance {
    pub registry: RegistrySource,
    pub source_id: String,
    pub checksum: String,
}

/// The merged, de-duplicated representation of one server across registries.
///
/// Created at first resolution of any record with a matching identity and
/// updated in place as new records arrive. Never silently deleted: entities
/// absent from the latest run are marked stale instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub global_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<ServerCategory>,
    #[serde(default)]
    pub operations: Vec<OperationType>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_score: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Set when the entity was absent from the latest run.
    #[serde(default)]
    pub stale: bool,
    /// Every contributing source record, never discarded.
    pub provenance: Vec<Provenance>,
}

impl CanonicalEntity {
    /// The category used for relationship inference and the inverted index.
    pub fn primary_category(&self) -> Option<ServerCategory> {
        self.categories.first().copied()
    }

    /// Best available popularity signal: popularity score, falling back to
    /// download count.
    pub fn popularity(&self) -> Option<u64> {
        self.popularity_score.or(self.download_count)
    }
}

/// The kind of relationship between two canonical entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    SameAuthor,
    SameCategory,
    SimilarPopularity,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::SameAuthor => "same_author",
            RelationKind::SameCategory => "same_category",
            RelationKind::SimilarPopularity => "similar_popularity",
        }
    }

    /// The fixed confidence assigned by the inference rule for this kind.
    pub fn confidence(&self) -> f64 {
        match self {
            RelationKind::SameAuthor => 0.9,
            RelationKind::SameCategory => 0.6,
            RelationKind::SimilarPopularity => 0.4,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, confidence-scored, undirected edge between two canonical
/// entities. Endpoints are stored in lexicographic order so the same pair
/// always serializes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub entity_a: String,
    pub entity_b: String,
    pub kind: RelationKind,
    pub confidence: f64,
    pub description: String,
}

impl RelationshipEdge {
    /// Build an edge with canonically ordered endpoints.
    pub fn new(
        a: impl Into<String>,
        b: impl Into<String>,
        kind: RelationKind,
        description: impl Into<String>,
    ) -> Self {
        let (a, b) = (a.into(), b.into());
        let (entity_a, entity_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            entity_a,
            entity_b,
            kind,
            confidence: kind.confidence(),
            description: description.into(),
        }
    }

    /// True if this edge touches the given entity.
    pub fn touches(&self, global_id: &str) -> bool {
        self.entity_a == global_id || self.entity_b == global_id
    }
}

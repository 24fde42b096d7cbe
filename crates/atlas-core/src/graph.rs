//! In-memory knowledge graph: canonical entities plus inferred edges.

use crate::entity::{CanonicalEntity, RelationshipEdge};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The resolved knowledge graph for one pipeline run.
///
/// Entities and edges live in plain maps and vectors keyed by GlobalID, not
/// pointer-linked nodes. The adjacency index is a performance structure,
/// rebuilt on load and after edge replacement, never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: GraphMetadata,
    /// Canonical entities keyed by GlobalID.
    pub entities: BTreeMap<String, CanonicalEntity>,
    /// Full edge set of the latest inference pass.
    pub edges: Vec<RelationshipEdge>,
    /// Performance index: GlobalID → edge indices in `edges`.
    #[serde(skip)]
    pub adjacency: HashMap<String, Vec<usize>>,
}

/// Aggregate statistics for the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub total_entities: usize,
    pub stale_entities: usize,
    pub total_edges: usize,
    /// Provenance records per registry.
    pub records_by_registry: BTreeMap<String, usize>,
    /// Edges per relationship kind.
    pub edges_by_kind: BTreeMap<String, usize>,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: "1.0.0".to_string(),
            created_at: now,
            updated_at: now,
            metadata: GraphMetadata::default(),
            entities: BTreeMap::new(),
            edges: Vec::new(),
            adjacency: HashMap::new(),
        }
    }

    pub fn insert_entity(&mut self, entity: CanonicalEntity) {
        self.entities.insert(entity.global_id.clone(), entity);
    }

    pub fn get_entity(&self, global_id: &str) -> Option<&CanonicalEntity> {
        self.entities.get(global_id)
    }

    /// Replace the full edge set. Edges are recomputed per pass, not patched
    /// incrementally, because edge existence depends on the whole entity set.
    pub fn replace_edges(&mut self, edges: Vec<RelationshipEdge>) {
        self.edges = edges;
        self.rebuild_adjacency();
    }

    /// Rebuild the adjacency index from the current edge list.
    pub fn rebuild_adjacency(&mut self) {
        self.adjacency.clear();
        for (i, edge) in self.edges.iter().enumerate() {
            self.adjacency
                .entry(edge.entity_a.clone())
                .or_default()
                .push(i);
            self.adjacency
                .entry(edge.entity_b.clone())
                .or_default()
                .push(i);
        }
    }

    /// All edges touching the given entity.
    pub fn edges_for(&self, global_id: &str) -> Vec<&RelationshipEdge> {
        if let Some(indices) = self.adjacency.get(global_id) {
            indices.iter().filter_map(|&i| self.edges.get(i)).collect()
        } else {
            // Fallback to linear scan if the index is not built
            self.edges.iter().filter(|e| e.touches(global_id)).collect()
        }
    }

    /// Mark entities absent from `seen` as stale. Returns how many entities
    /// changed state. Stale entities are never removed here; only an
    /// explicit clear drops them.
    pub fn mark_stale_absent(&mut self, seen: &HashSet<String>) -> usize {
        let mut flipped = 0;
        for (id, entity) in &mut self.entities {
            let absent = !seen.contains(id);
            if absent != entity.stale {
                entity.stale = absent;
                flipped += 1;
            }
        }
        flipped
    }

    /// Recompute metadata from current state and rebuild the adjacency index.
    pub fn refresh_metadata(&mut self) {
        self.metadata.total_entities = self.entities.len();
        self.metadata.stale_entities = self.entities.values().filter(|e| e.stale).count();
        self.metadata.total_edges = self.edges.len();

        let mut by_registry: BTreeMap<String, usize> = BTreeMap::new();
        for entity in self.entities.values() {
            for prov in &entity.provenance {
                *by_registry.entry(prov.registry.to_string()).or_insert(0) += 1;
            }
        }
        self.metadata.records_by_registry = by_registry;

        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &self.edges {
            *by_kind.entry(edge.kind.to_string()).or_insert(0) += 1;
        }
        self.metadata.edges_by_kind = by_kind;

        self.updated_at = Utc::now();
        self.rebuild_adjacency();
    }
}

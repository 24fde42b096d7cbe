//! Aggregate statistics over the resolved graph.

use atlas_core::graph::KnowledgeGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_entities: usize,
    pub stale_entities: usize,
    pub total_edges: usize,
    pub entities_by_category: BTreeMap<String, usize>,
    pub records_by_registry: BTreeMap<String, usize>,
    pub entities_by_language: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
    /// `(global_id, popularity)` of the most popular entities, descending.
    pub top_by_popularity: Vec<(String, u64)>,
}

impl GraphStats {
    pub fn collect(graph: &KnowledgeGraph, top: usize) -> Self {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_language: BTreeMap<String, usize> = BTreeMap::new();
        let mut popular: Vec<(String, u64)> = Vec::new();

        for entity in graph.entities.values() {
            for category in &entity.categories {
                *by_category.entry(category.to_string()).or_insert(0) += 1;
            }
            if let Some(language) = &entity.language {
                *by_language.entry(language.to_lowercase()).or_insert(0) += 1;
            }
            if let Some(popularity) = entity.popularity() {
                popular.push((entity.global_id.clone(), popularity));
            }
        }

        popular.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        popular.truncate(top);

        Self {
            total_entities: graph.entities.len(),
            stale_entities: graph.metadata.stale_entities,
            total_edges: graph.edges.len(),
            entities_by_category: by_category,
            records_by_registry: graph.metadata.records_by_registry.clone(),
            entities_by_language: by_language,
            edges_by_kind: graph.metadata.edges_by_kind.clone(),
            top_by_popularity: popular,
        }
    }

    /// Human-readable rendering for CLI output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Knowledge graph statistics");
        let _ = writeln!(
            out,
            "  entities: {} ({} stale), edges: {}",
            self.total_entities, self.stale_entities, self.total_edges
        );

        let _ = writeln!(out, "  by category:");
        for (category, count) in &self.entities_by_category {
            let _ = writeln!(out, "    {category}: {count}");
        }

        let _ = writeln!(out, "  records by registry:");
        for (registry, count) in &self.records_by_registry {
            let _ = writeln!(out, "    {registry}: {count}");
        }

        if !self.entities_by_language.is_empty() {
            let _ = writeln!(out, "  by language:");
            for (language, count) in &self.entities_by_language {
                let _ = writeln!(out, "    {language}: {count}");
            }
        }

        let _ = writeln!(out, "  edges by kind:");
        for (kind, count) in &self.edges_by_kind {
            let _ = writeln!(out, "    {kind}: {count}");
        }

        if !self.top_by_popularity.is_empty() {
            let _ = writeln!(out, "  most popular:");
            for (global_id, popularity) in &self.top_by_popularity {
                let _ = writeln!(out, "    {global_id}: {popularity}");
            }
        }
        out
    }
}

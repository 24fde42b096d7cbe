//! The search consumer contract.
//!
//! Scores canonical entities against a free-text prompt with the documented
//! weights: name match 3.0, description match 2.0, per-category match 2.0,
//! per-operation match 1.5, popularity bonus 0.1 × popularity. The scorer
//! reads only canonical attributes; transport wiring lives elsewhere.

use atlas_core::entity::CanonicalEntity;
use atlas_core::graph::KnowledgeGraph;
use serde::{Deserialize, Serialize};

const WEIGHT_NAME: f64 = 3.0;
const WEIGHT_DESCRIPTION: f64 = 2.0;
const WEIGHT_CATEGORY: f64 = 2.0;
const WEIGHT_OPERATION: f64 = 1.5;
const POPULARITY_BONUS: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub prompt: String,
    pub limit: usize,
    /// Minimum score a hit must reach to be returned.
    #[serde(default)]
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub entities: Vec<SearchHit>,
    /// Matches before the limit was applied.
    pub total_found: usize,
    pub metadata: SearchMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub global_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub score: f64,
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_score: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub entities_scored: usize,
    pub query_terms: Vec<String>,
}

/// Search the resolved graph. Stale entities are excluded, since they
/// describe servers no registry lists anymore.
pub fn search(graph: &KnowledgeGraph, request: &SearchRequest) -> SearchResponse {
    let terms: Vec<String> = request
        .prompt
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut scored = 0usize;

    for entity in graph.entities.values() {
        if entity.stale {
            continue;
        }
        scored += 1;
        let score = score_entity(entity, &terms);
        if score > 0.0 && score >= request.min_confidence {
            hits.push(SearchHit {
                global_id: entity.global_id.clone(),
                name: entity.name.clone(),
                description: entity.description.clone(),
                score,
                categories: entity.categories.iter().map(|c| c.to_string()).collect(),
                popularity_score: entity.popularity_score,
            });
        }
    }

    // Score descending, GlobalID ascending: fully deterministic ordering.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.global_id.cmp(&b.global_id))
    });

    let total_found = hits.len();
    hits.truncate(request.limit);

    SearchResponse {
        entities: hits,
        total_found,
        metadata: SearchMetadata {
            entities_scored: scored,
            query_terms: terms,
        },
    }
}

fn score_entity(entity: &CanonicalEntity, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let name = entity.name.to_lowercase();
    let description = entity
        .description
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    let mut score = 0.0;
    let mut matched = false;

    for term in terms {
        if name.contains(term.as_str()) {
            score += WEIGHT_NAME;
            matched = true;
        }
        if description.contains(term.as_str()) {
            score += WEIGHT_DESCRIPTION;
            matched = true;
        }
        for category in &entity.categories {
            if category.as_str().contains(term.as_str()) {
                score += WEIGHT_CATEGORY;
                matched = true;
            }
        }
        for operation in &entity.operations {
            if operation.as_str() == term {
                score += WEIGHT_OPERATION;
                matched = true;
            }
        }
    }

    // The popularity bonus only applies to entities the prompt matched;
    // otherwise popular servers would surface for every query.
    if matched && let Some(popularity) = entity.popularity_score {
        score += POPULARITY_BONUS * popularity as f64;
    }
    score
}

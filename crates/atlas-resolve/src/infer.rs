//! Relationship inference between canonical entities.
//!
//! Candidate pairs come only from an inverted index keyed by author and by
//! primary category, so the pass never does an all-pairs comparison. Rules
//! run in priority order and the first match wins; pairs matching no rule get
//! no edge, keeping the graph deliberately sparse.

use crate::similarity;
use atlas_core::config::InferenceConfig;
use atlas_core::entity::{CanonicalEntity, RelationKind, RelationshipEdge};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Computes confidence-scored typed edges between canonical entities.
pub struct RelationshipInferencer {
    config: InferenceConfig,
}

impl RelationshipInferencer {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Infer the full edge set for one resolution pass.
    ///
    /// Deterministic: an unchanged entity set yields a byte-identical edge
    /// list. Candidate pairs are collected into an ordered set and the
    /// output is sorted, with no randomized tie-breaking anywhere.
    pub fn infer(&self, entities: &[CanonicalEntity]) -> Vec<RelationshipEdge> {
        let by_id: HashMap<&str, &CanonicalEntity> = entities
            .iter()
            .map(|e| (e.global_id.as_str(), e))
            .collect();

        // Inverted index: bucket by non-placeholder author and by primary
        // category. Built once per pass, shared read-only across shards.
        let mut buckets: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for entity in entities {
            if let Some(author) = entity.author.as_deref() {
                let author = author.trim().to_lowercase();
                if !similarity::is_placeholder_author(&author) {
                    buckets
                        .entry(format!("author:{author}"))
                        .or_default()
                        .push(&entity.global_id);
                }
            }
            if let Some(category) = entity.primary_category() {
                buckets
                    .entry(format!("category:{category}"))
                    .or_default()
                    .push(&entity.global_id);
            }
        }

        // Deduplicate pairs across buckets before rule evaluation; a pair
        // sharing both author and category must be scored exactly once.
        let mut pairs: BTreeSet<(&str, &str)> = BTreeSet::new();
        for ids in buckets.values() {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    let pair = if a <= b { (a, b) } else { (b, a) };
                    pairs.insert(pair);
                }
            }
        }

        let mut edges: Vec<RelationshipEdge> = pairs
            .into_par_iter()
            .filter_map(|(a, b)| self.infer_pair(by_id[a], by_id[b]))
            .collect();

        edges.sort_by(|x, y| {
            (&x.entity_a, &x.entity_b, x.kind).cmp(&(&y.entity_a, &y.entity_b, y.kind))
        });

        tracing::info!(edges = edges.len(), "relationship inference complete");
        edges
    }

    /// Apply the rules to one indexed-eligible pair. First match wins.
    fn infer_pair(
        &self,
        a: &CanonicalEntity,
        b: &CanonicalEntity,
    ) -> Option<RelationshipEdge> {
        // Rule 1: same author.
        if similarity::authors_match(a.author.as_deref(), b.author.as_deref()) {
            let author = a.author.as_deref().unwrap_or_default();
            return Some(RelationshipEdge::new(
                &a.global_id,
                &b.global_id,
                RelationKind::SameAuthor,
                format!("both published by {author}"),
            ));
        }

        // Rule 2: shared non-generic primary category.
        if let (Some(ca), Some(cb)) = (a.primary_category(), b.primary_category())
            && ca == cb
            && !ca.is_generic()
        {
            return Some(RelationshipEdge::new(
                &a.global_id,
                &b.global_id,
                RelationKind::SameCategory,
                format!("both categorized as {ca}"),
            ));
        }

        // Rule 3: same popularity tier (both popular, or both niche).
        if let (Some(pa), Some(pb)) = (a.popularity(), b.popularity()) {
            let popular = self.config.popular_threshold;
            let niche = self.config.niche_threshold;
            if (pa >= popular && pb >= popular) || (pa <= niche && pb <= niche) {
                let tier = if pa >= popular { "popular" } else { "niche" };
                return Some(RelationshipEdge::new(
                    &a.global_id,
                    &b.global_id,
                    RelationKind::SimilarPopularity,
                    format!("both in the {tier} popularity tier"),
                ));
            }
        }

        None
    }
}

//! Cross-record matching and merging into canonical entities.
//!
//! The resolver owns the canonical map for the duration of a run and is its
//! single writer. Records are folded in a canonically sorted order, so
//! resolving any permutation of the same input (or resolving incrementally
//! versus all at once) produces the same final entity set.

use crate::identity::{GlobalId, normalize_repository_url};
use crate::similarity;
use atlas_core::config::ResolutionConfig;
use atlas_core::entity::{CanonicalEntity, Provenance};
use atlas_core::error::ConflictingMatch;
use atlas_core::record::{OperationType, RawRecord, ServerCategory, ToolSpec};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Match confidences, one per rule, in evaluation order. The first rule a
/// pair satisfies determines its confidence; no double counting.
const CONFIDENCE_GLOBAL_ID: f64 = 1.0;
const CONFIDENCE_REPOSITORY: f64 = 0.95;
const CONFIDENCE_FUZZY_NAME: f64 = 0.8;
const CONFIDENCE_TOKEN_SET: f64 = 0.7;

/// Tokens shorter than this are too common to index for content matching.
const MIN_INDEX_TOKEN_LEN: usize = 3;

/// A raw record paired with its derived GlobalID.
#[derive(Debug, Clone)]
pub struct IdentifiedRecord {
    pub global_id: GlobalId,
    pub record: RawRecord,
}

/// The output of one resolution pass.
#[derive(Debug)]
pub struct Resolution {
    /// Canonical entities, sorted by GlobalID.
    pub entities: Vec<CanonicalEntity>,
    /// Ambiguous matches that were attached to their higher-confidence
    /// candidate and flagged for review.
    pub conflicts: Vec<ConflictingMatch>,
}

/// Precomputed matching features for one record.
struct Member {
    global_id: GlobalId,
    record: RawRecord,
    norm_repo: Option<String>,
    norm_author: Option<String>,
    tokens: BTreeSet<String>,
}

/// Matches raw records into canonical entities and merges their attributes.
pub struct EntityResolver {
    config: ResolutionConfig,
}

impl EntityResolver {
    pub fn new(config: ResolutionConfig) -> Self {
        Self { config }
    }

    /// Resolve a full record set into canonical entities.
    pub fn resolve(&self, records: Vec<IdentifiedRecord>) -> Resolution {
        let mut members: Vec<Member> = records
            .into_iter()
            .map(|r| {
                let norm_repo = r
                    .record
                    .repository_url
                    .as_deref()
                    .and_then(normalize_repository_url);
                let norm_author = r.record.author.as_deref().and_then(|a| {
                    let a = a.trim().to_lowercase();
                    if similarity::is_placeholder_author(&a) {
                        None
                    } else {
                        Some(a)
                    }
                });
                let tokens = similarity::content_tokens(&r.record);
                Member {
                    global_id: r.global_id,
                    record: r.record,
                    norm_repo,
                    norm_author,
                    tokens,
                }
            })
            .collect();

        // Canonical fold order: any input permutation resolves identically.
        members.sort_by(|a, b| {
            (
                &a.global_id.id,
                a.record.source_registry,
                &a.record.source_id,
                &a.record.checksum,
            )
                .cmp(&(
                    &b.global_id.id,
                    b.record.source_registry,
                    &b.record.source_id,
                    &b.record.checksum,
                ))
        });

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_global_id: HashMap<String, usize> = HashMap::new();
        let mut by_repo: HashMap<String, usize> = HashMap::new();
        let mut by_author: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_token: HashMap<String, Vec<usize>> = HashMap::new();
        let mut conflicts: Vec<ConflictingMatch> = Vec::new();

        for idx in 0..members.len() {
            let matches = self.find_matches(
                &members[idx],
                &members,
                &groups,
                &by_global_id,
                &by_repo,
                &by_author,
                &by_token,
            );

            let target = match matches.first() {
                None => {
                    groups.push(Vec::new());
                    groups.len() - 1
                }
                Some(&(chosen_group, chosen_confidence)) => {
                    // A record pointing at two different canonical entities is
                    // attached to the higher-confidence match only; every
                    // other candidate becomes a reported conflict.
                    for &(other_group, other_confidence) in &matches[1..] {
                        conflicts.push(ConflictingMatch {
                            registry: members[idx].record.source_registry,
                            source_id: members[idx].record.source_id.clone(),
                            chosen: canonical_group_id(&groups[chosen_group], &members),
                            chosen_confidence,
                            rejected: canonical_group_id(&groups[other_group], &members),
                            rejected_confidence: other_confidence,
                        });
                    }
                    chosen_group
                }
            };

            groups[target].push(idx);

            let member = &members[idx];
            by_global_id
                .entry(member.global_id.id.clone())
                .or_insert(target);
            if let Some(repo) = &member.norm_repo {
                by_repo.entry(repo.clone()).or_insert(target);
            }
            if let Some(author) = &member.norm_author {
                let entries = by_author.entry(author.clone()).or_default();
                if !entries.contains(&target) {
                    entries.push(target);
                }
            }
            for token in &member.tokens {
                if token.len() < MIN_INDEX_TOKEN_LEN {
                    continue;
                }
                let entries = by_token.entry(token.clone()).or_default();
                if !entries.contains(&target) {
                    entries.push(target);
                }
            }
        }

        let mut entities: Vec<CanonicalEntity> = groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| self.merge_group(g, &members))
            .collect();
        entities.sort_by(|a, b| a.global_id.cmp(&b.global_id));

        tracing::info!(
            records = members.len(),
            entities = entities.len(),
            conflicts = conflicts.len(),
            "resolution pass complete"
        );

        Resolution {
            entities,
            conflicts,
        }
    }

    /// Evaluate the ordered match rules for one record against the existing
    /// groups. Returns `(group, confidence)` per distinct candidate group,
    /// in rule-priority order; the first entry is the match to merge into.
    #[allow(clippy::too_many_arguments)]
    fn find_matches(
        &self,
        member: &Member,
        members: &[Member],
        groups: &[Vec<usize>],
        by_global_id: &HashMap<String, usize>,
        by_repo: &HashMap<String, usize>,
        by_author: &HashMap<String, Vec<usize>>,
        by_token: &HashMap<String, Vec<usize>>,
    ) -> Vec<(usize, f64)> {
        let mut matches: Vec<(usize, f64)> = Vec::new();
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut push = |group: usize, confidence: f64, matches: &mut Vec<(usize, f64)>| {
            if seen.insert(group) {
                matches.push((group, confidence));
            }
        };

        // Rule a: exact GlobalID equality.
        if let Some(&group) = by_global_id.get(&member.global_id.id) {
            push(group, CONFIDENCE_GLOBAL_ID, &mut matches);
        }

        // Rule b: same normalized repository URL despite differing GlobalIDs
        // (naming variance across registries).
        if let Some(repo) = &member.norm_repo
            && let Some(&group) = by_repo.get(repo)
        {
            push(group, CONFIDENCE_REPOSITORY, &mut matches);
        }

        // Rule c: fuzzy name similarity with a matching non-placeholder author.
        if let Some(author) = &member.norm_author
            && let Some(candidates) = by_author.get(author)
        {
            for &group in candidates {
                let similar = groups[group].iter().any(|&i| {
                    similarity::name_similarity(&members[i].record.name, &member.record.name)
                        >= self.config.fuzzy_name_threshold
                });
                if similar {
                    push(group, CONFIDENCE_FUZZY_NAME, &mut matches);
                }
            }
        }

        // Rule d: token-set similarity over description+category+tool sets.
        let mut candidates: BTreeSet<usize> = BTreeSet::new();
        for token in &member.tokens {
            if token.len() < MIN_INDEX_TOKEN_LEN {
                continue;
            }
            if let Some(entries) = by_token.get(token) {
                candidates.extend(entries.iter().copied());
            }
        }
        for group in candidates {
            let similar = groups[group].iter().any(|&i| {
                similarity::jaccard(&members[i].tokens, &member.tokens)
                    >= self.config.token_set_threshold
            });
            if similar {
                push(group, CONFIDENCE_TOKEN_SET, &mut matches);
            }
        }

        matches
    }

    /// Merge a matched group of records into one canonical entity.
    fn merge_group(&self, group: &[usize], members: &[Member]) -> CanonicalEntity {
        let global_id = canonical_group_id(group, members);

        // Newest capture first; checksum breaks exact timestamp ties.
        let mut ordered: Vec<&Member> = group.iter().map(|&i| &members[i]).collect();
        ordered.sort_by(|a, b| {
            b.record
                .fetched_at
                .cmp(&a.record.fetched_at)
                .then_with(|| a.record.checksum.cmp(&b.record.checksum))
        });

        let prefer_detailed = self.config.prefer_detailed;
        let name = pick_scalar(&ordered, prefer_detailed, |r| Some(r.name.as_str()))
            .unwrap_or_else(|| global_id.clone());
        let description = pick_scalar(&ordered, prefer_detailed, |r| r.description.as_deref());
        let author = pick_scalar(&ordered, prefer_detailed, |r| r.author.as_deref());
        let repository_url =
            pick_scalar(&ordered, prefer_detailed, |r| r.repository_url.as_deref());
        let language = pick_scalar(&ordered, prefer_detailed, |r| r.language.as_deref());
        let version = pick_scalar(&ordered, prefer_detailed, |r| r.version.as_deref());
        let license = pick_scalar(&ordered, prefer_detailed, |r| r.license.as_deref());
        let homepage = pick_scalar(&ordered, prefer_detailed, |r| r.homepage.as_deref());

        // Set-valued fields: union, sorted for deterministic output.
        let categories: BTreeSet<ServerCategory> = ordered
            .iter()
            .flat_map(|m| m.record.categories.iter().copied())
            .collect();
        let operations: BTreeSet<OperationType> = ordered
            .iter()
            .flat_map(|m| m.record.operations.iter().copied())
            .collect();

        // Tools union by name; the richer description wins a name collision.
        let mut tools: BTreeMap<String, ToolSpec> = BTreeMap::new();
        for member in &ordered {
            for tool in &member.record.tools {
                let key = tool.name.to_lowercase();
                match tools.get_mut(&key) {
                    None => {
                        tools.insert(key, tool.clone());
                    }
                    Some(existing) => {
                        let new_len = tool.description.as_deref().map_or(0, str::len);
                        let old_len = existing.description.as_deref().map_or(0, str::len);
                        if new_len > old_len {
                            *existing = tool.clone();
                        }
                    }
                }
            }
        }

        // Popularity metrics are monotonic: the maximum observed value wins,
        // which avoids double counting across registries.
        let popularity_score = ordered
            .iter()
            .filter_map(|m| m.record.popularity_score)
            .max();
        let download_count = ordered
            .iter()
            .filter_map(|m| m.record.download_count)
            .max();

        let first_seen = ordered
            .iter()
            .map(|m| m.record.fetched_at)
            .min()
            .unwrap_or_else(Utc::now);
        let last_seen = ordered
            .iter()
            .map(|m| m.record.fetched_at)
            .max()
            .unwrap_or_else(Utc::now);

        // Every contributing record is retained, never discarded.
        let provenance: BTreeSet<Provenance> = ordered
            .iter()
            .map(|m| Provenance {
                registry: m.record.source_registry,
                source_id: m.record.source_id.clone(),
                checksum: m.record.checksum.clone(),
            })
            .collect();

        CanonicalEntity {
            global_id,
            name,
            description,
            author,
            repository_url,
            categories: categories.into_iter().collect(),
            operations: operations.into_iter().collect(),
            tools: tools.into_values().collect(),
            popularity_score,
            download_count,
            language,
            version,
            license,
            homepage,
            first_seen,
            last_seen,
            stale: false,
            provenance: provenance.into_iter().collect(),
        }
    }
}

/// The canonical GlobalID of a group: the most stable derivation tier wins,
/// then lexicographic order.
fn canonical_group_id(group: &[usize], members: &[Member]) -> String {
    group
        .iter()
        .map(|&i| &members[i].global_id)
        .min_by(|a, b| (a.tier, &a.id).cmp(&(b.tier, &b.id)))
        .map(|g| g.id.clone())
        .unwrap_or_default()
}

/// Pick a scalar value: prefer the non-empty value from the most recent
/// capture; among equally recent values prefer the longer string when
/// `prefer_detailed` is set, otherwise the first in sort order. Final ties
/// break lexicographically, so the pick never depends on input order.
fn pick_scalar<'a, F>(ordered: &[&'a Member], prefer_detailed: bool, get: F) -> Option<String>
where
    F: Fn(&'a RawRecord) -> Option<&'a str>,
{
    let mut best: Option<(DateTime<Utc>, &str)> = None;
    for member in ordered {
        let Some(value) = get(&member.record) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let at = member.record.fetched_at;
        best = Some(match best {
            None => (at, value),
            Some((best_at, best_value)) => {
                use std::cmp::Ordering;
                match at.cmp(&best_at) {
                    Ordering::Greater => (at, value),
                    Ordering::Less => (best_at, best_value),
                    Ordering::Equal => {
                        let wins = if prefer_detailed {
                            match value.len().cmp(&best_value.len()) {
                                Ordering::Greater => true,
                                Ordering::Less => false,
                                Ordering::Equal => value < best_value,
                            }
                        } else {
                            value < best_value
                        };
                        if wins { (at, value) } else { (best_at, best_value) }
                    }
                }
            }
        });
    }
    best.map(|(_, v)| v.to_string())
}

/// Convenience: derive IDs for a batch of records, splitting off the
/// unidentifiable ones instead of dropping them.
pub fn identify_records(
    records: Vec<RawRecord>,
) -> (
    Vec<IdentifiedRecord>,
    Vec<atlas_core::error::UnidentifiableRecord>,
) {
    let mut identified = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match crate::identity::derive_global_id(&record) {
            Ok(global_id) => identified.push(IdentifiedRecord { global_id, record }),
            Err(err) => {
                tracing::warn!(%err, "rejecting unidentifiable record");
                rejected.push(err);
            }
        }
    }
    (identified, rejected)
}

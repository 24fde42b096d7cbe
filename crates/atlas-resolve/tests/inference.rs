use atlas_core::config::InferenceConfig;
use atlas_core::entity::{CanonicalEntity, Provenance, RelationKind};
use atlas_core::record::{RegistrySource, ServerCategory};
use atlas_resolve::RelationshipInferencer;
use chrono::{TimeZone, Utc};

fn make_entity(
    global_id: &str,
    author: Option<&str>,
    categories: Vec<ServerCategory>,
    popularity: Option<u64>,
) -> CanonicalEntity {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
    CanonicalEntity {
        global_id: global_id.to_string(),
        name: global_id.to_string(),
        description: None,
        author: author.map(String::from),
        repository_url: None,
        categories,
        operations: Vec::new(),
        tools: Vec::new(),
        popularity_score: popularity,
        download_count: None,
        language: None,
        version: None,
        license: None,
        homepage: None,
        first_seen: at,
        last_seen: at,
        stale: false,
        provenance: vec![Provenance {
            registry: RegistrySource::Github,
            source_id: global_id.to_string(),
            checksum: "ck".to_string(),
        }],
    }
}

fn inferencer() -> RelationshipInferencer {
    RelationshipInferencer::new(InferenceConfig::default())
}

#[test]
fn test_same_author_edge() {
    // Shared author, different categories: exactly one same_author edge,
    // no same_category edge.
    let entities = vec![
        make_entity(
            "acme-labs/db",
            Some("acme-labs"),
            vec![ServerCategory::Database],
            None,
        ),
        make_entity(
            "acme-labs/mail",
            Some("acme-labs"),
            vec![ServerCategory::Communication],
            None,
        ),
    ];

    let edges = inferencer().infer(&entities);

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, RelationKind::SameAuthor);
    assert_eq!(edges[0].confidence, 0.9);
    assert!(edges[0].description.contains("acme-labs"));
}

#[test]
fn test_first_match_wins_over_same_category() {
    // Author AND category both shared: only the higher-priority rule fires.
    let entities = vec![
        make_entity(
            "acme/a",
            Some("acme"),
            vec![ServerCategory::Database],
            None,
        ),
        make_entity(
            "acme/b",
            Some("acme"),
            vec![ServerCategory::Database],
            None,
        ),
    ];

    let edges = inferencer().infer(&entities);

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, RelationKind::SameAuthor);
}

#[test]
fn test_same_category_edge() {
    let entities = vec![
        make_entity("a/pg", Some("alice"), vec![ServerCategory::Database], None),
        make_entity("b/mysql", Some("bob"), vec![ServerCategory::Database], None),
    ];

    let edges = inferencer().infer(&entities);

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, RelationKind::SameCategory);
    assert_eq!(edges[0].confidence, 0.6);
}

#[test]
fn test_generic_category_gets_no_category_edge() {
    // "other" carries no signal; without a popularity tier in common there
    // is no edge at all.
    let entities = vec![
        make_entity("a/misc", Some("alice"), vec![ServerCategory::Other], Some(5000)),
        make_entity("b/misc", Some("bob"), vec![ServerCategory::Other], Some(10)),
    ];

    let edges = inferencer().infer(&entities);
    assert!(edges.is_empty());
}

#[test]
fn test_similar_popularity_edge_for_generic_category_pairs() {
    // Pair is index-eligible through the shared (generic) primary category;
    // the category rule passes on it, the popularity rule picks it up.
    let entities = vec![
        make_entity("a/misc", Some("alice"), vec![ServerCategory::Other], Some(5000)),
        make_entity("b/misc", Some("bob"), vec![ServerCategory::Other], Some(9000)),
    ];

    let edges = inferencer().infer(&entities);

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, RelationKind::SimilarPopularity);
    assert_eq!(edges[0].confidence, 0.4);
    assert!(edges[0].description.contains("popular"));
}

#[test]
fn test_both_niche_counts_as_similar_popularity() {
    let entities = vec![
        make_entity("a/tiny", None, vec![ServerCategory::Other], Some(3)),
        make_entity("b/tiny", None, vec![ServerCategory::Other], Some(7)),
    ];

    let edges = inferencer().infer(&entities);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, RelationKind::SimilarPopularity);
    assert!(edges[0].description.contains("niche"));
}

#[test]
fn test_disjoint_entities_get_zero_edges() {
    // Different authors, different categories, opposite popularity tiers.
    let entities = vec![
        make_entity(
            "a/db",
            Some("alice"),
            vec![ServerCategory::Database],
            Some(9000),
        ),
        make_entity(
            "b/mail",
            Some("bob"),
            vec![ServerCategory::Communication],
            Some(2),
        ),
    ];

    let edges = inferencer().infer(&entities);
    assert!(edges.is_empty());
}

#[test]
fn test_placeholder_authors_never_pair() {
    let entities = vec![
        make_entity("a/x", Some("unknown"), Vec::new(), None),
        make_entity("b/y", Some("unknown"), Vec::new(), None),
    ];

    let edges = inferencer().infer(&entities);
    assert!(edges.is_empty());
}

#[test]
fn test_inference_is_deterministic() {
    let mut entities = Vec::new();
    for i in 0..20u64 {
        let author = if i % 3 == 0 { Some("acme") } else { Some("zeta") };
        let category = if i % 2 == 0 {
            ServerCategory::Database
        } else {
            ServerCategory::Search
        };
        entities.push(make_entity(
            &format!("srv/{i:02}"),
            author,
            vec![category],
            Some(i * 100),
        ));
    }

    let first = inferencer().infer(&entities);
    let second = inferencer().infer(&entities);

    // Byte-identical output on an unchanged entity set
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(!first.is_empty());
}

#[test]
fn test_edges_are_undirected_and_canonically_ordered() {
    let entities = vec![
        make_entity("zeta/b", Some("acme"), Vec::new(), None),
        make_entity("alpha/a", Some("acme"), Vec::new(), None),
    ];

    let edges = inferencer().infer(&entities);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].entity_a, "alpha/a");
    assert_eq!(edges[0].entity_b, "zeta/b");
}

//! Neo4j-backed graph store over the transactional HTTP endpoint.
//!
//! One `UNWIND $rows MERGE ...` statement per batch keeps the round-trip
//! count at one per batch regardless of batch size. Uses blocking HTTP via
//! `ureq`; the pipeline has no async runtime.

use crate::store::{GraphStore, StoreError};
use atlas_core::config::LoaderConfig;
use atlas_core::entity::{CanonicalEntity, RelationshipEdge};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

const UPSERT_ENTITIES: &str = "\
UNWIND $rows AS row \
MERGE (s:Server {global_id: row.global_id}) \
SET s += row.props";

const UPSERT_EDGES: &str = "\
UNWIND $rows AS row \
MATCH (a:Server {global_id: row.entity_a}) \
MATCH (b:Server {global_id: row.entity_b}) \
MERGE (a)-[r:RELATES_TO {kind: row.kind}]-(b) \
SET r.confidence = row.confidence, r.description = row.description";

const CLEAR_MANAGED: &str = "MATCH (s:Server) DETACH DELETE s";

const SCHEMA_STATEMENTS: [&str; 4] = [
    "CREATE CONSTRAINT server_global_id_unique IF NOT EXISTS \
     FOR (s:Server) REQUIRE s.global_id IS UNIQUE",
    "CREATE INDEX server_name_index IF NOT EXISTS FOR (s:Server) ON (s.name)",
    "CREATE INDEX server_category_index IF NOT EXISTS FOR (s:Server) ON (s.categories)",
    "CREATE INDEX server_popularity_index IF NOT EXISTS FOR (s:Server) ON (s.popularity_score)",
];

/// Graph store speaking Neo4j's `POST /db/<name>/tx/commit` protocol.
pub struct CypherHttpStore {
    endpoint: String,
    auth_header: Option<String>,
    agent: ureq::Agent,
}

impl CypherHttpStore {
    pub fn new(config: &LoaderConfig) -> Self {
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            config.uri.trim_end_matches('/'),
            config.database
        );
        let auth_header = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some(format!(
                "Basic {}",
                BASE64.encode(format!("{user}:{pass}"))
            )),
            _ => None,
        };
        Self {
            endpoint,
            auth_header,
            agent: ureq::Agent::new_with_config(
                ureq::config::Config::builder()
                    .timeout_global(Some(std::time::Duration::from_secs(120)))
                    .build(),
            ),
        }
    }

    /// Run one Cypher statement with parameters; returns the raw response.
    fn run(&self, statement: &str, parameters: Value) -> Result<Value, StoreError> {
        let body = json!({
            "statements": [
                {"statement": statement, "parameters": parameters}
            ]
        });

        let mut request = self
            .agent
            .post(&self.endpoint)
            .header("content-type", "application/json");
        if let Some(auth) = &self.auth_header {
            request = request.header("authorization", auth);
        }

        let mut response = request
            .send_json(&body)
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let json: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| StoreError::Parse(e.to_string()))?;

        if let Some(err) = json
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|arr| arr.first())
        {
            return Err(StoreError::Backend {
                code: err
                    .get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                message: err
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        Ok(json)
    }

    /// Query: GlobalIDs of entities carrying the given category.
    pub fn entities_by_category(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let json = self.run(
            "MATCH (s:Server) WHERE $category IN s.categories \
             RETURN s.global_id ORDER BY s.global_id",
            json!({"category": category}),
        )?;
        Ok(result_column(&json))
    }

    /// Query: edge descriptions at or above a confidence floor.
    pub fn edges_above_confidence(&self, min: f64) -> Result<Vec<String>, StoreError> {
        let json = self.run(
            "MATCH (a:Server)-[r:RELATES_TO]-(b:Server) WHERE r.confidence >= $min \
             AND a.global_id < b.global_id \
             RETURN a.global_id + ' -[' + r.kind + ']- ' + b.global_id \
             ORDER BY r.confidence DESC",
            json!({"min": min}),
        )?;
        Ok(result_column(&json))
    }

    /// Query: the most popular entities, by descending popularity score.
    pub fn top_by_popularity(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let json = self.run(
            "MATCH (s:Server) WHERE s.popularity_score IS NOT NULL \
             RETURN s.global_id ORDER BY s.popularity_score DESC LIMIT $limit",
            json!({"limit": limit}),
        )?;
        Ok(result_column(&json))
    }
}

impl GraphStore for CypherHttpStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_STATEMENTS {
            self.run(statement, json!({}))?;
        }
        Ok(())
    }

    fn upsert_entities(&self, entities: &[CanonicalEntity]) -> Result<usize, StoreError> {
        if entities.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = entities.iter().map(entity_row).collect();
        self.run(UPSERT_ENTITIES, json!({"rows": rows}))?;
        Ok(entities.len())
    }

    fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<usize, StoreError> {
        if edges.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = edges
            .iter()
            .map(|e| {
                json!({
                    "entity_a": e.entity_a,
                    "entity_b": e.entity_b,
                    "kind": e.kind.as_str(),
                    "confidence": e.confidence,
                    "description": e.description,
                })
            })
            .collect();
        self.run(UPSERT_EDGES, json!({"rows": rows}))?;
        Ok(edges.len())
    }

    fn clear_managed(&self) -> Result<(), StoreError> {
        self.run(CLEAR_MANAGED, json!({}))?;
        Ok(())
    }
}

/// Flatten an entity into the property map a graph node can carry:
/// scalars and lists of primitives only, no nested structures.
fn entity_row(entity: &CanonicalEntity) -> Value {
    let categories: Vec<&str> = entity.categories.iter().map(|c| c.as_str()).collect();
    let operations: Vec<&str> = entity.operations.iter().map(|o| o.as_str()).collect();
    let tool_names: Vec<&str> = entity.tools.iter().map(|t| t.name.as_str()).collect();
    let registries: Vec<String> = entity
        .provenance
        .iter()
        .map(|p| p.registry.to_string())
        .collect();

    json!({
        "global_id": entity.global_id,
        "props": {
            "global_id": entity.global_id,
            "name": entity.name,
            "description": entity.description,
            "author": entity.author,
            "repository_url": entity.repository_url,
            "categories": categories,
            "operations": operations,
            "tool_names": tool_names,
            "popularity_score": entity.popularity_score,
            "download_count": entity.download_count,
            "language": entity.language,
            "version": entity.version,
            "license": entity.license,
            "homepage": entity.homepage,
            "first_seen": entity.first_seen.to_rfc3339(),
            "last_seen": entity.last_seen.to_rfc3339(),
            "stale": entity.stale,
            "registries": registries,
            "provenance_count": entity.provenance.len(),
        }
    })
}

/// Extract the first column of every row from a tx/commit response.
fn result_column(json: &Value) -> Vec<String> {
    json.pointer("/results/0/data")
        .and_then(|d| d.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.pointer("/row/0"))
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

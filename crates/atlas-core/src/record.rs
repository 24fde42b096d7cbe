//! Raw registry records: one registry's view of one server at fetch time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The registries this pipeline ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrySource {
    #[serde(rename = "github")]
    Github,
    #[serde(rename = "mcp.so")]
    McpSo,
    #[serde(rename = "glama")]
    Glama,
    #[serde(rename = "mcpmarket.com")]
    McpMarket,
}

impl RegistrySource {
    /// All known registries, in canonical order.
    pub const ALL: [RegistrySource; 4] = [
        RegistrySource::Github,
        RegistrySource::McpSo,
        RegistrySource::Glama,
        RegistrySource::McpMarket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrySource::Github => "github",
            RegistrySource::McpSo => "mcp.so",
            RegistrySource::Glama => "glama",
            RegistrySource::McpMarket => "mcpmarket.com",
        }
    }

    /// Directory-safe name (registry names may contain dots).
    pub fn dir_name(&self) -> &'static str {
        match self {
            RegistrySource::Github => "github",
            RegistrySource::McpSo => "mcp_so",
            RegistrySource::Glama => "glama",
            RegistrySource::McpMarket => "mcpmarket",
        }
    }
}

impl std::fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RegistrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(RegistrySource::Github),
            "mcp.so" | "mcp_so" => Ok(RegistrySource::McpSo),
            "glama" => Ok(RegistrySource::Glama),
            "mcpmarket.com" | "mcpmarket" => Ok(RegistrySource::McpMarket),
            other => Err(format!("unknown registry: {other}")),
        }
    }
}

/// Closed category vocabulary shared by every registry adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ServerCategory {
    Database,
    FileSystem,
    ApiIntegration,
    DevelopmentTools,
    DataProcessing,
    CloudServices,
    Communication,
    Authentication,
    Monitoring,
    Search,
    AiMl,
    Other,
}

impl ServerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerCategory::Database => "database",
            ServerCategory::FileSystem => "file_system",
            ServerCategory::ApiIntegration => "api_integration",
            ServerCategory::DevelopmentTools => "development_tools",
            ServerCategory::DataProcessing => "data_processing",
            ServerCategory::CloudServices => "cloud_services",
            ServerCategory::Communication => "communication",
            ServerCategory::Authentication => "authentication",
            ServerCategory::Monitoring => "monitoring",
            ServerCategory::Search => "search",
            ServerCategory::AiMl => "ai_ml",
            ServerCategory::Other => "other",
        }
    }

    /// A generic category carries no relationship signal.
    pub fn is_generic(&self) -> bool {
        matches!(self, ServerCategory::Other)
    }
}

impl std::fmt::Display for ServerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a server does with the data it touches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Read,
    Write,
    Query,
    Execute,
    Transform,
    Analyze,
    Sync,
    Stream,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Read => "read",
            OperationType::Write => "write",
            OperationType::Query => "query",
            OperationType::Execute => "execute",
            OperationType::Transform => "transform",
            OperationType::Analyze => "analyze",
            OperationType::Sync => "sync",
            OperationType::Stream => "stream",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool exposed by a server, as advertised by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One registry's unprocessed description of one server at fetch time.
///
/// Adapters convert each registry's loose payload into this shape before any
/// matching logic runs, so matching and merge code never branches on the source
/// registry. Immutable once captured into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_registry: RegistrySource,
    /// Registry-local identifier (slug, numeric id, repo path, whatever the
    /// registry uses).
    pub source_id: String,
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
    pub fetched_at: DateTime<Utc>,
    /// Content checksum over identifying fields. Empty until the record is
    /// captured; SnapshotStore computes and owns it.
    #[serde(default)]
    pub checksum: String,
}

impl RawRecord {
    /// A minimal record for the given registry and source id; everything else
    /// empty. Mostly a test/adapter convenience.
    pub fn new(
        source_registry: RegistrySource,
        source_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            source_registry,
            source_id: source_id.into(),
            name: name.into(),
            description: None,
            author: None,
            repository_url: None,
            categories: Vec::new(),
            operations: Vec::new(),
            tools: Vec::new(),
            popularity_score: None,
            download_count: None,
            language: None,
            version: None,
            license: None,
            homepage: None,
            fetched_at: Utc::now(),
            checksum: String::new(),
        }
    }
}

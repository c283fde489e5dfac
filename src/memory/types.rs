//! Typed records for the cognitive memory store.
//!
//! Defines [`MemoryType`], [`EdgeType`], the recall selectors [`RecallStrategy`] and
//! [`DetailLevel`], and one record type per table: [`Memory`], [`Association`],
//! [`HierarchyNode`] and [`SharedMemoryRecord`]. Constructors for new rows validate
//! the table invariants before anything reaches SQL.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Cognitive category of a memory. Drives decay rate and shareability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Events and experiences. Fades fastest, never shared.
    Episodic,
    /// Facts, knowledge, preferences.
    Semantic,
    /// Workflows and how-to knowledge. Most durable.
    Procedural,
}

impl MemoryType {
    pub const ALL: [MemoryType; 3] = [Self::Episodic, Self::Semantic, Self::Procedural];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// Kind of association edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Semantic,
    Temporal,
    Explicit,
    Causal,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Temporal => "temporal",
            Self::Explicit => "explicit",
            Self::Causal => "causal",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(Self::Semantic),
            "temporal" => Ok(Self::Temporal),
            "explicit" => Ok(Self::Explicit),
            "causal" => Ok(Self::Causal),
            _ => Err(format!("unknown edge type: {s}")),
        }
    }
}

/// How `recall` ranks candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecallStrategy {
    /// Full-text rank only.
    Keyword,
    /// Cosine similarity only.
    Vector,
    /// Weighted blend of both.
    #[default]
    Hybrid,
}

impl std::str::FromStr for RecallStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("unknown recall strategy: {s}")),
        }
    }
}

/// Which hierarchy level `recall_adaptive` searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// Infer the level from the shape of the query.
    #[default]
    Auto,
    /// Level 2 summaries.
    Broad,
    /// Level 0 raw memories.
    Specific,
    Level(u32),
}

impl std::str::FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "broad" => Ok(Self::Broad),
            "specific" => Ok(Self::Specific),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|l| *l <= 3)
                .map(Self::Level)
                .ok_or_else(|| format!("unknown detail level: {other} (auto|broad|specific|0-3)")),
        }
    }
}

/// A memory row as stored. The embedding lives in `memories_vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7 primary key.
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    /// Free-text provenance tag (`agent`, `user`, `consolidation`, `hierarchy`, ...).
    pub source: String,
    pub importance: f64,
    /// Starts at 1.0 and only goes down, through decay.
    pub strength: f64,
    pub access_count: u32,
    pub last_accessed: Option<String>,
    pub created_at: String,
    pub is_deleted: bool,
    pub metadata: Option<serde_json::Value>,
}

/// Columns selected by [`Memory::from_row`], in order.
pub const MEMORY_COLUMNS: &str = "id, content, memory_type, source, importance, strength, \
     access_count, last_accessed, created_at, is_deleted, metadata";

impl Memory {
    /// Map a row selected with [`MEMORY_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let type_str: String = row.get(2)?;
        let memory_type = type_str.parse::<MemoryType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?;
        let metadata: Option<String> = row.get(10)?;
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            memory_type,
            source: row.get(3)?,
            importance: row.get(4)?,
            strength: row.get(5)?,
            access_count: row.get(6)?,
            last_accessed: row.get(7)?,
            created_at: row.get(8)?,
            is_deleted: row.get::<_, i64>(9)? != 0,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        })
    }
}

/// Input for a new memory, validated on construction.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub memory_type: MemoryType,
    pub source: String,
    pub importance: f64,
    pub metadata: Option<serde_json::Value>,
}

impl NewMemory {
    pub fn new(
        content: impl Into<String>,
        memory_type: MemoryType,
        source: impl Into<String>,
        importance: f64,
    ) -> Result<Self> {
        let content = content.into();
        ensure!(!content.trim().is_empty(), "content must not be empty");
        ensure!(
            (0.0..=1.0).contains(&importance),
            "importance must be between 0.0 and 1.0, got {importance}"
        );
        Ok(Self {
            content,
            memory_type,
            source: source.into(),
            importance,
            metadata: None,
        })
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Directed weighted edge between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: i64,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub created_at: String,
    pub metadata: Option<serde_json::Value>,
}

impl Association {
    /// Reject self-loops and weights outside `[0, 1]`.
    pub fn validate(source_id: &str, target_id: &str, weight: f64) -> Result<()> {
        ensure!(source_id != target_id, "association endpoints must differ");
        ensure!(
            (0.0..=1.0).contains(&weight),
            "association weight must be between 0.0 and 1.0, got {weight}"
        );
        Ok(())
    }

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let edge: String = row.get(3)?;
        let edge_type = edge.parse::<EdgeType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;
        let metadata: Option<String> = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            target_id: row.get(2)?,
            edge_type,
            weight: row.get(4)?,
            created_at: row.get(5)?,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        })
    }
}

/// One node of the summary tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: i64,
    pub memory_id: String,
    pub parent_id: Option<i64>,
    pub level: u32,
    pub summary: Option<String>,
    pub created_at: String,
}

impl HierarchyNode {
    pub fn label(&self) -> &'static str {
        level_label(self.level)
    }
}

/// Human label for a hierarchy level.
pub fn level_label(level: u32) -> &'static str {
    match level {
        0 => "raw",
        1 => "topic",
        2 => "theme",
        _ => "domain",
    }
}

/// A disclosure of one memory to another agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedMemoryRecord {
    pub id: String,
    pub memory_id: String,
    pub shared_by: String,
    pub shared_with: String,
    pub consent_owner: bool,
    pub consent_target: bool,
    pub sensitivity: f64,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

impl SharedMemoryRecord {
    pub fn is_active(&self) -> bool {
        self.consent_owner && self.revoked_at.is_none()
    }

    pub fn is_fully_consented(&self) -> bool {
        self.is_active() && self.consent_target
    }
}

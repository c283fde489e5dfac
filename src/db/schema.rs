//! SQL DDL for the cognitive memory store.
//!
//! Defines `memories`, `memories_fts` (FTS5), `memories_vec` (vec0), `associations`,
//! `memory_hierarchy`, `shared_memories`, `memory_log` and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Core memory storage. Rows are soft-deleted via is_deleted until hard delete.
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL CHECK(memory_type IN ('episodic','semantic','procedural')),
    source TEXT NOT NULL DEFAULT 'agent',
    importance REAL NOT NULL DEFAULT 0.5 CHECK(importance >= 0.0 AND importance <= 1.0),
    strength REAL NOT NULL DEFAULT 1.0,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,
    created_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_deleted ON memories(is_deleted);

-- Full-text search (BM25), kept in sync by the write paths
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    id UNINDEXED,
    content='memories',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

-- Association graph
CREATE TABLE IF NOT EXISTS associations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    edge_type TEXT NOT NULL CHECK(edge_type IN ('semantic','temporal','explicit','causal')),
    weight REAL NOT NULL DEFAULT 0.5 CHECK(weight >= 0.0 AND weight <= 1.0),
    created_at TEXT NOT NULL,
    metadata TEXT,
    UNIQUE(source_id, target_id, edge_type)
);

CREATE INDEX IF NOT EXISTS idx_assoc_source ON associations(source_id);
CREATE INDEX IF NOT EXISTS idx_assoc_target ON associations(target_id);

-- Summary tree, rebuilt wholesale by build_hierarchy
CREATE TABLE IF NOT EXISTS memory_hierarchy (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    parent_id INTEGER REFERENCES memory_hierarchy(id) ON DELETE SET NULL,
    level INTEGER NOT NULL CHECK(level >= 0),
    summary TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hierarchy_level ON memory_hierarchy(level);
CREATE INDEX IF NOT EXISTS idx_hierarchy_parent ON memory_hierarchy(parent_id);

-- Cross-agent disclosures; revoked rows stay for history
CREATE TABLE IF NOT EXISTS shared_memories (
    id TEXT PRIMARY KEY,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    shared_by TEXT NOT NULL,
    shared_with TEXT NOT NULL,
    consent_owner INTEGER NOT NULL DEFAULT 1,
    consent_target INTEGER NOT NULL DEFAULT 0,
    sensitivity REAL NOT NULL,
    created_at TEXT NOT NULL,
    revoked_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_shared_memory ON shared_memories(memory_id);
CREATE INDEX IF NOT EXISTS idx_shared_with ON shared_memories(shared_with);

-- Audit log
CREATE TABLE IF NOT EXISTS memory_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','decay','consolidate','forget','delete','share','revoke')),
    memory_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VEC_TABLE_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

//! Write path: insert row, sync FTS5, insert vector, audit.
//!
//! [`store_memory`] takes a precomputed embedding; [`remember`] embeds first.
//! Both run the row, FTS and vector writes inside one transaction.

use anyhow::{ensure, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::memory::types::NewMemory;

#[derive(Debug, Serialize)]
pub struct StoreMemoryResult {
    /// UUID of the new memory.
    pub id: String,
    pub memory_type: String,
    pub created_at: String,
}

/// Store a memory whose embedding the caller already has.
pub fn store_memory(
    conn: &mut Connection,
    memory: &NewMemory,
    embedding: &[f32],
) -> Result<StoreMemoryResult> {
    let tx = conn.transaction()?;
    let (id, created_at) = insert_memory(&tx, memory, embedding)?;
    tx.commit()?;

    tracing::debug!(id = %id, memory_type = %memory.memory_type, "memory stored");
    Ok(StoreMemoryResult {
        id,
        memory_type: memory.memory_type.as_str().to_string(),
        created_at,
    })
}

/// Embed `memory.content`, then store it.
pub fn remember(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    memory: &NewMemory,
) -> Result<StoreMemoryResult> {
    let embedding = embedder.embed(&memory.content)?;
    store_memory(conn, memory, &embedding)
}

/// Insert row + FTS + vector + audit entry on an open connection or transaction.
/// Returns `(id, created_at)`.
pub(crate) fn insert_memory(
    conn: &Connection,
    memory: &NewMemory,
    embedding: &[f32],
) -> Result<(String, String)> {
    ensure!(
        embedding.len() == crate::embedding::EMBEDDING_DIM,
        "embedding has {} dimensions, store expects {}",
        embedding.len(),
        crate::embedding::EMBEDDING_DIM
    );

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let metadata_json = memory
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO memories (id, content, memory_type, source, importance, strength, access_count, last_accessed, created_at, is_deleted, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1.0, 0, ?6, ?6, 0, ?7)",
        params![
            id,
            memory.content,
            memory.memory_type.as_str(),
            memory.source,
            memory.importance,
            now,
            metadata_json,
        ],
    )?;
    let rowid = conn.last_insert_rowid();

    // FTS rowid must match the memories rowid
    conn.execute(
        "INSERT INTO memories_fts (rowid, content, id) VALUES (?1, ?2, ?3)",
        params![rowid, memory.content, id],
    )?;

    conn.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
        params![id, super::embedding_to_bytes(embedding)],
    )?;

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({"type": memory.memory_type.as_str(), "source": memory.source})),
    )?;

    Ok((id, now))
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, memory_id, details_json, now],
    )?;
    Ok(())
}

//! Soft and hard memory deletion.
//!
//! Soft delete flips `is_deleted`, hiding the memory from every recall path while
//! keeping the row for audit. Hard delete removes the row, its FTS entry and its
//! vector; associations, hierarchy rows and shares go with it via FK cascade.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::store::write_audit_log;
use crate::embedding::EmbeddingProvider;
use crate::memory::types::RecallStrategy;

#[derive(Debug, Serialize)]
pub struct ForgetResult {
    pub id: String,
    /// `true` if the memory was permanently removed; `false` for soft delete.
    pub hard_deleted: bool,
}

/// Soft-delete one memory by id. Fails if the id is unknown.
pub fn forget(conn: &mut Connection, memory_id: &str) -> Result<ForgetResult> {
    let tx = conn.transaction()?;
    soft_delete(&tx, memory_id, "explicit")?;
    tx.commit()?;
    Ok(ForgetResult {
        id: memory_id.to_string(),
        hard_deleted: false,
    })
}

/// Soft-delete every memory a hybrid recall of `query` returns, up to `limit`.
pub fn forget_matching(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    limit: usize,
    vec_weight: f64,
) -> Result<Vec<ForgetResult>> {
    let matches = super::search::recall(
        conn,
        embedder,
        query,
        RecallStrategy::Hybrid,
        limit,
        vec_weight,
    )?;

    let tx = conn.transaction()?;
    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        soft_delete(&tx, &m.memory.id, "query")?;
        out.push(ForgetResult {
            id: m.memory.id,
            hard_deleted: false,
        });
    }
    tx.commit()?;

    tracing::info!(query_len = query.len(), forgotten = out.len(), "forgot by query");
    Ok(out)
}

/// Permanently remove a memory. Returns `false` if no such memory existed.
pub fn hard_delete(conn: &mut Connection, memory_id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    let removed = hard_delete_in(&tx, memory_id)?;
    tx.commit()?;
    Ok(removed)
}

pub(crate) fn soft_delete(conn: &Connection, memory_id: &str, reason: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE memories SET is_deleted = 1 WHERE id = ?1",
        params![memory_id],
    )?;
    if rows == 0 {
        bail!("memory not found: {memory_id}");
    }
    write_audit_log(
        conn,
        "forget",
        memory_id,
        Some(&serde_json::json!({"reason": reason})),
    )?;
    Ok(())
}

/// Hard delete on an open connection or transaction.
pub(crate) fn hard_delete_in(conn: &Connection, memory_id: &str) -> Result<bool> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT rowid, content FROM memories WHERE id = ?1",
            params![memory_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((rowid, content)) = row else {
        return Ok(false);
    };

    // External-content FTS5 tables need the old values to delete
    conn.execute(
        "INSERT INTO memories_fts(memories_fts, rowid, content, id) VALUES('delete', ?1, ?2, ?3)",
        params![rowid, content, memory_id],
    )?;
    conn.execute("DELETE FROM memories_vec WHERE id = ?1", params![memory_id])?;
    write_audit_log(conn, "delete", memory_id, None)?;
    conn.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::store_memory;
    use crate::memory::types::{MemoryType, NewMemory};

    fn spike(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 384];
        v[i] = 1.0;
        v
    }

    fn insert(conn: &mut Connection, content: &str, seed: usize) -> String {
        let memory = NewMemory::new(content, MemoryType::Episodic, "agent", 0.5).unwrap();
        store_memory(conn, &memory, &spike(seed)).unwrap().id
    }

    #[test]
    fn soft_delete_keeps_row() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let id = insert(&mut conn, "something to forget", 1);

        let result = forget(&mut conn, &id).unwrap();
        assert!(!result.hard_deleted);

        let deleted: i64 = conn
            .query_row("SELECT is_deleted FROM memories WHERE id = ?1", [&id], |r| r.get(0))
            .unwrap();
        assert_eq!(deleted, 1);
    }

    #[test]
    fn forget_unknown_id_fails() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let err = forget(&mut conn, "nope").unwrap_err();
        assert!(err.to_string().contains("memory not found"));
    }

    #[test]
    fn hard_delete_removes_everything() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let id = insert(&mut conn, "permanently delete this", 2);

        assert!(hard_delete(&mut conn, &id).unwrap());
        assert!(!hard_delete(&mut conn, &id).unwrap());

        for table in ["memories", "memories_vec"] {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
                    [&id],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 0, "{table} still holds the row");
        }
        let fts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'permanently'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(fts, 0);
    }
}

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Response from memory_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_active: u64,
    pub total_deleted: u64,
    /// Active memories per type. Every type is present, zero or not.
    pub by_type: BTreeMap<String, u64>,
    pub with_embeddings: u64,
    pub db_size_bytes: u64,
}

/// Compute memory store statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn memory_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let (active, deleted): (i64, i64) = conn.query_row(
        "SELECT \
            COALESCE(SUM(CASE WHEN is_deleted = 0 THEN 1 ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN is_deleted = 1 THEN 1 ELSE 0 END), 0) \
         FROM memories",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let by_type = count_by_type(conn)?;

    let with_embeddings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories_vec v JOIN memories m ON m.id = v.id WHERE m.is_deleted = 0",
        [],
        |row| row.get(0),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_active: active as u64,
        total_deleted: deleted as u64,
        by_type,
        with_embeddings: with_embeddings as u64,
        db_size_bytes,
    })
}

fn count_by_type(conn: &Connection) -> Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = crate::memory::types::MemoryType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare(
        "SELECT memory_type, COUNT(*) FROM memories WHERE is_deleted = 0 GROUP BY memory_type",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (memory_type, count) = row?;
        map.insert(memory_type, count as u64);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::forget::forget;
    use crate::memory::store::store_memory;
    use crate::memory::types::{MemoryType, NewMemory};

    #[test]
    fn counts_active_deleted_and_types() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let mut v = vec![0.0f32; 384];
        v[0] = 1.0;
        let a = store_memory(
            &mut conn,
            &NewMemory::new("first", MemoryType::Semantic, "agent", 0.5).unwrap(),
            &v,
        )
        .unwrap();
        store_memory(
            &mut conn,
            &NewMemory::new("second", MemoryType::Procedural, "agent", 0.5).unwrap(),
            &v,
        )
        .unwrap();
        forget(&mut conn, &a.id).unwrap();

        let stats = memory_stats(&conn, None).unwrap();
        assert_eq!(stats.total_active, 1);
        assert_eq!(stats.total_deleted, 1);
        assert_eq!(stats.by_type["procedural"], 1);
        assert_eq!(stats.by_type["semantic"], 0);
        assert_eq!(stats.by_type["episodic"], 0);
        assert_eq!(stats.with_embeddings, 1);
        assert_eq!(stats.db_size_bytes, 0);
    }
}

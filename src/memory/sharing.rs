//! Cross-agent sharing behind a sensitivity gate and dual consent.
//!
//! The sharer consents by creating the share. The recipient consents through
//! [`approve_share`]. Revocation stamps `revoked_at` and keeps the row.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::search::get_memory;
use super::store::write_audit_log;
use crate::config::SharingConfig;
use crate::memory::types::{MemoryType, SharedMemoryRecord};

const SHARE_COLUMNS: &str = "s.id, s.memory_id, s.shared_by, s.shared_with, s.consent_owner, \
     s.consent_target, s.sensitivity, s.created_at, s.revoked_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareDirection {
    /// Shares created by the agent.
    From,
    /// Shares addressed to the agent.
    To,
    #[default]
    Both,
}

impl std::str::FromStr for ShareDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from" => Ok(Self::From),
            "to" => Ok(Self::To),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown share direction: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RevokeTarget {
    Share(String),
    /// Every active share of one memory.
    Memory(String),
}

#[derive(Debug, Serialize)]
pub struct SharedEntry {
    #[serde(flatten)]
    pub share: SharedMemoryRecord,
    pub content: String,
    pub fully_consented: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct SharingStats {
    pub active: usize,
    /// Active shares still waiting on the recipient.
    pub pending: usize,
    pub revoked: usize,
}

/// Type sensitivity scaled up by importance: `base * (0.5 + importance * 0.5)`.
pub fn effective_sensitivity(config: &SharingConfig, memory_type: MemoryType, importance: f64) -> f64 {
    config.base_sensitivity(memory_type) * (0.5 + importance * 0.5)
}

/// Share a memory with another agent.
///
/// Returns `Ok(None)` when the gate refuses: episodic memories never pass, and
/// nothing passes whose effective sensitivity reaches `threshold`. An existing
/// active share to the same recipient is returned instead of a new one.
pub fn share_memory(
    conn: &Connection,
    memory_id: &str,
    shared_by: &str,
    shared_with: &str,
    threshold: f64,
    config: &SharingConfig,
) -> Result<Option<String>> {
    let Some(memory) = get_memory(conn, memory_id)? else {
        bail!("memory not found: {memory_id}");
    };
    if memory.is_deleted {
        bail!("memory not found: {memory_id}");
    }

    if memory.memory_type == MemoryType::Episodic {
        tracing::info!(id = %memory_id, "share refused: episodic memories are private");
        return Ok(None);
    }
    let sensitivity = effective_sensitivity(config, memory.memory_type, memory.importance);
    if sensitivity >= threshold {
        tracing::info!(id = %memory_id, sensitivity, threshold, "share refused: too sensitive");
        return Ok(None);
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM shared_memories \
             WHERE memory_id = ?1 AND shared_with = ?2 AND consent_owner = 1 AND revoked_at IS NULL",
            params![memory_id, shared_with],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(Some(id));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO shared_memories \
         (id, memory_id, shared_by, shared_with, consent_owner, consent_target, sensitivity, created_at) \
         VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?6)",
        params![id, memory_id, shared_by, shared_with, sensitivity, now],
    )?;
    write_audit_log(
        conn,
        "share",
        memory_id,
        Some(&serde_json::json!({"share_id": id, "with": shared_with, "sensitivity": sensitivity})),
    )?;

    tracing::info!(id = %memory_id, share = %id, to = %shared_with, "memory shared");
    Ok(Some(id))
}

/// Record the recipient's consent. Returns `false` for unknown or revoked shares.
pub fn approve_share(conn: &Connection, share_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE shared_memories SET consent_target = 1 WHERE id = ?1 AND revoked_at IS NULL",
        params![share_id],
    )?;
    Ok(rows > 0)
}

/// Revoke one share or all shares of a memory. Returns how many were revoked.
pub fn revoke_share(conn: &Connection, target: &RevokeTarget) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    let affected: Vec<(String, String)> = {
        let (sql, key) = match target {
            RevokeTarget::Share(id) => (
                "SELECT id, memory_id FROM shared_memories WHERE id = ?1 AND revoked_at IS NULL",
                id,
            ),
            RevokeTarget::Memory(id) => (
                "SELECT id, memory_id FROM shared_memories WHERE memory_id = ?1 AND revoked_at IS NULL",
                id,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([key], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    for (share_id, memory_id) in &affected {
        conn.execute(
            "UPDATE shared_memories SET revoked_at = ?1 WHERE id = ?2",
            params![now, share_id],
        )?;
        write_audit_log(
            conn,
            "revoke",
            memory_id,
            Some(&serde_json::json!({"share_id": share_id})),
        )?;
    }
    Ok(affected.len())
}

/// Active shares, optionally filtered by agent and direction, newest first.
pub fn get_shared(
    conn: &Connection,
    agent: Option<&str>,
    direction: ShareDirection,
) -> Result<Vec<SharedEntry>> {
    let filter = match (agent, direction) {
        (None, _) => "",
        (Some(_), ShareDirection::From) => "AND s.shared_by = ?1",
        (Some(_), ShareDirection::To) => "AND s.shared_with = ?1",
        (Some(_), ShareDirection::Both) => "AND (s.shared_by = ?1 OR s.shared_with = ?1)",
    };
    let sql = format!(
        "SELECT {SHARE_COLUMNS}, m.content FROM shared_memories s \
         JOIN memories m ON m.id = s.memory_id \
         WHERE s.consent_owner = 1 AND s.revoked_at IS NULL AND m.is_deleted = 0 {filter} \
         ORDER BY s.created_at DESC, s.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &Row<'_>| -> rusqlite::Result<SharedEntry> {
        let share = share_from_row(row)?;
        Ok(SharedEntry {
            fully_consented: share.is_fully_consented(),
            share,
            content: row.get(9)?,
        })
    };
    let entries = match agent {
        Some(agent) => stmt.query_map([agent], map)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(entries)
}

pub fn sharing_stats(conn: &Connection) -> Result<SharingStats> {
    let (active, pending, revoked): (i64, i64, i64) = conn.query_row(
        "SELECT \
            COALESCE(SUM(CASE WHEN consent_owner = 1 AND revoked_at IS NULL THEN 1 ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN consent_owner = 1 AND revoked_at IS NULL AND consent_target = 0 THEN 1 ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN revoked_at IS NOT NULL THEN 1 ELSE 0 END), 0) \
         FROM shared_memories",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(SharingStats {
        active: active as usize,
        pending: pending as usize,
        revoked: revoked as usize,
    })
}

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<SharedMemoryRecord> {
    Ok(SharedMemoryRecord {
        id: row.get(0)?,
        memory_id: row.get(1)?,
        shared_by: row.get(2)?,
        shared_with: row.get(3)?,
        consent_owner: row.get(4)?,
        consent_target: row.get(5)?,
        sensitivity: row.get(6)?,
        created_at: row.get(7)?,
        revoked_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::store_memory;
    use crate::memory::types::NewMemory;

    fn insert(conn: &mut Connection, memory_type: MemoryType, importance: f64) -> String {
        let mut v = vec![0.0f32; 384];
        v[0] = 1.0;
        let memory = NewMemory::new("shareable fact", memory_type, "agent", importance).unwrap();
        store_memory(conn, &memory, &v).unwrap().id
    }

    #[test]
    fn sensitivity_scales_with_importance() {
        let config = SharingConfig::default();
        assert!((effective_sensitivity(&config, MemoryType::Semantic, 0.0) - 0.15).abs() < 1e-9);
        assert!((effective_sensitivity(&config, MemoryType::Semantic, 1.0) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn sensitive_memories_are_refused() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let id = insert(&mut conn, MemoryType::Semantic, 1.0);
        let config = SharingConfig::default();
        // effective 0.3 against a 0.3 threshold
        assert!(share_memory(&conn, &id, "agent", "peer", 0.3, &config)
            .unwrap()
            .is_none());
        assert!(share_memory(&conn, &id, "agent", "peer", 0.5, &config)
            .unwrap()
            .is_some());
    }

    #[test]
    fn sharing_twice_returns_same_share() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let id = insert(&mut conn, MemoryType::Procedural, 0.2);
        let config = SharingConfig::default();
        let first = share_memory(&conn, &id, "agent", "peer", 0.5, &config).unwrap();
        let second = share_memory(&conn, &id, "agent", "peer", 0.5, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(sharing_stats(&conn).unwrap().active, 1);
    }

    #[test]
    fn unknown_memory_is_an_error() {
        let conn = crate::db::open_memory_database().unwrap();
        let err = share_memory(&conn, "missing", "agent", "peer", 0.5, &SharingConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("memory not found"));
    }

    #[test]
    fn direction_filters() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let id = insert(&mut conn, MemoryType::Semantic, 0.0);
        let config = SharingConfig::default();
        share_memory(&conn, &id, "alpha", "beta", 0.5, &config).unwrap();

        assert_eq!(get_shared(&conn, Some("alpha"), ShareDirection::From).unwrap().len(), 1);
        assert_eq!(get_shared(&conn, Some("alpha"), ShareDirection::To).unwrap().len(), 0);
        assert_eq!(get_shared(&conn, Some("beta"), ShareDirection::Both).unwrap().len(), 1);
        assert_eq!(get_shared(&conn, None, ShareDirection::Both).unwrap().len(), 1);
    }
}

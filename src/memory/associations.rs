//! Association graph: typed, weighted, directed edges between memories.
//!
//! Edges are unique on `(source_id, target_id, edge_type)`. Re-asserting an edge
//! keeps the larger of the old and new weight, so edges only ever strengthen.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::memory::search::{fetch_memories, recall, RecallResult};
use crate::memory::types::{Association, EdgeType, Memory, RecallStrategy};

/// Score multiplier applied per hop in [`recall_associated`].
const HOP_DECAY: f64 = 0.7;
/// Weight used when a cluster member has no stored embedding.
const MISSING_EMBEDDING_WEIGHT: f64 = 0.3;
const MIN_CLUSTER_WEIGHT: f64 = 0.1;

#[derive(Debug, Serialize)]
pub struct AssociateResult {
    pub id: i64,
    /// `false` when the edge already existed and was only strengthened (or left alone).
    pub created: bool,
    pub weight: f64,
}

/// Create or strengthen an edge.
pub fn associate(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
    edge_type: EdgeType,
    weight: f64,
    metadata: Option<&serde_json::Value>,
) -> Result<AssociateResult> {
    Association::validate(source_id, target_id, weight)?;
    ensure_exists(conn, source_id)?;
    ensure_exists(conn, target_id)?;

    let existing: Option<(i64, f64)> = conn
        .query_row(
            "SELECT id, weight FROM associations \
             WHERE source_id = ?1 AND target_id = ?2 AND edge_type = ?3",
            params![source_id, target_id, edge_type.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    if let Some((id, old)) = existing {
        let weight = old.max(weight);
        if weight > old {
            conn.execute(
                "UPDATE associations SET weight = ?1 WHERE id = ?2",
                params![weight, id],
            )?;
        }
        return Ok(AssociateResult {
            id,
            created: false,
            weight,
        });
    }

    let now = Utc::now().to_rfc3339();
    let metadata_json = metadata.map(|m| m.to_string());
    conn.execute(
        "INSERT INTO associations (source_id, target_id, edge_type, weight, created_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![source_id, target_id, edge_type.as_str(), weight, now, metadata_json],
    )?;

    Ok(AssociateResult {
        id: conn.last_insert_rowid(),
        created: true,
        weight,
    })
}

fn ensure_exists(conn: &Connection, memory_id: &str) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM memories WHERE id = ?1",
            params![memory_id],
            |row| row.get(0),
        )
        .optional()?;
    if found.is_none() {
        bail!("memory not found: {memory_id}");
    }
    Ok(())
}

/// Every edge touching `memory_id`, outbound first.
pub fn get_associations(conn: &Connection, memory_id: &str) -> Result<Vec<Association>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_id, target_id, edge_type, weight, created_at, metadata \
         FROM associations WHERE source_id = ?1 OR target_id = ?1 \
         ORDER BY (source_id = ?1) DESC, weight DESC, id",
    )?;
    let rows = stmt
        .query_map(params![memory_id], Association::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The far end of an edge, seen from one memory.
#[derive(Debug, Clone)]
pub(crate) struct Neighbor {
    pub memory_id: String,
    pub edge_type: EdgeType,
    pub weight: f64,
}

/// Live neighbors over outbound and inbound edges.
pub(crate) fn neighbors(conn: &Connection, memory_id: &str) -> Result<Vec<Neighbor>> {
    let mut stmt = conn.prepare(
        "SELECT CASE WHEN a.source_id = ?1 THEN a.target_id ELSE a.source_id END AS other, \
                a.edge_type, a.weight \
         FROM associations a \
         JOIN memories m ON m.id = (CASE WHEN a.source_id = ?1 THEN a.target_id ELSE a.source_id END) \
         WHERE (a.source_id = ?1 OR a.target_id = ?1) AND m.is_deleted = 0 \
         ORDER BY a.id",
    )?;
    let rows = stmt.query_map(params![memory_id], |row| {
        let edge: String = row.get(1)?;
        Ok((row.get::<_, String>(0)?, edge, row.get::<_, f64>(2)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (other, edge, weight) = row?;
        let edge_type = edge
            .parse::<EdgeType>()
            .map_err(|e| anyhow::anyhow!("corrupt association row: {e}"))?;
        out.push(Neighbor {
            memory_id: other,
            edge_type,
            weight,
        });
    }
    Ok(out)
}

/// Link every ordered pair in a cluster with a semantic edge.
///
/// Weight is the pair's cosine similarity floored at 0.1, or 0.3 when either side
/// has no stored embedding. Returns the number of edges newly created.
pub fn build_cluster_associations(conn: &Connection, member_ids: &[String]) -> Result<usize> {
    let embeddings = super::load_embeddings(conn, member_ids)?;
    let mut created = 0;

    for a in member_ids {
        for b in member_ids {
            if a == b {
                continue;
            }
            let weight = match (embeddings.get(a), embeddings.get(b)) {
                (Some(ea), Some(eb)) => {
                    (cosine_similarity(ea, eb) as f64).clamp(MIN_CLUSTER_WEIGHT, 1.0)
                }
                _ => MISSING_EMBEDDING_WEIGHT,
            };
            if associate(conn, a, b, EdgeType::Semantic, weight, None)?.created {
                created += 1;
            }
        }
    }

    Ok(created)
}

/// Link memories created within `window_minutes` of each other, earlier → later.
///
/// Weight falls linearly from 1.0 at zero gap towards 0.1 at the window edge.
/// Returns the number of edges newly created.
pub fn build_temporal_associations(conn: &Connection, window_minutes: f64) -> Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at FROM memories WHERE is_deleted = 0 ORDER BY created_at, id",
    )?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let timeline: Vec<(String, DateTime<Utc>)> = rows
        .into_iter()
        .filter_map(|(id, ts)| match DateTime::parse_from_rfc3339(&ts) {
            Ok(t) => Some((id, t.with_timezone(&Utc))),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping memory with unparseable timestamp");
                None
            }
        })
        .collect();

    let window_secs = window_minutes * 60.0;
    let mut created = 0;
    for (i, (earlier, t0)) in timeline.iter().enumerate() {
        for (later, t1) in &timeline[i + 1..] {
            let gap = (*t1 - *t0).num_milliseconds() as f64 / 1000.0;
            // sorted by time, so nothing further along can be closer
            if gap > window_secs {
                break;
            }
            let weight = if window_secs > 0.0 {
                (1.0 - gap / window_secs).clamp(MIN_CLUSTER_WEIGHT, 1.0)
            } else {
                1.0
            };
            if associate(conn, earlier, later, EdgeType::Temporal, weight, None)?.created {
                created += 1;
            }
        }
    }

    tracing::info!(created, window_minutes, "temporal associations built");
    Ok(created)
}

/// A memory reached from the recall seeds by walking the graph.
#[derive(Debug, Clone, Serialize)]
pub struct AssociatedResult {
    #[serde(flatten)]
    pub memory: Memory,
    pub score: f64,
    /// 0 for direct recall hits.
    pub hop: u32,
    /// Edge type used to reach this memory; `None` for direct hits.
    pub via: Option<EdgeType>,
}

/// Hybrid recall, then breadth-first expansion over `hops` levels of edges.
///
/// A memory first reached at hop `h` over an edge of weight `w` scores `w * 0.7^h`.
/// Direct hits scoring zero or less match nothing and are dropped before expansion.
/// Results are ordered by hop, then score.
pub fn recall_associated(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    hops: u32,
    limit: usize,
    vec_weight: f64,
) -> Result<Vec<AssociatedResult>> {
    let seeds: Vec<RecallResult> =
        recall(conn, embedder, query, RecallStrategy::Hybrid, limit, vec_weight)?
            .into_iter()
            .filter(|r| r.score > 0.0)
            .collect();

    let mut seen: HashSet<String> = seeds.iter().map(|r| r.memory.id.clone()).collect();
    let mut results: Vec<AssociatedResult> = seeds
        .iter()
        .map(|r| AssociatedResult {
            memory: r.memory.clone(),
            score: r.score,
            hop: 0,
            via: None,
        })
        .collect();

    let mut discovered: Vec<(String, f64, u32, EdgeType)> = Vec::new();
    let mut frontier: Vec<String> = seeds.into_iter().map(|r| r.memory.id).collect();
    for hop in 1..=hops {
        let mut next = Vec::new();
        for id in &frontier {
            for n in neighbors(conn, id)? {
                if seen.insert(n.memory_id.clone()) {
                    let score = n.weight * HOP_DECAY.powi(hop as i32);
                    discovered.push((n.memory_id.clone(), score, hop, n.edge_type));
                    next.push(n.memory_id);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let ids: Vec<String> = discovered.iter().map(|(id, ..)| id.clone()).collect();
    let mut rows = fetch_memories(conn, &ids)?;
    for (id, score, hop, via) in discovered {
        if let Some(memory) = rows.remove(&id) {
            results.push(AssociatedResult {
                memory,
                score: super::round4(score),
                hop,
                via: Some(via),
            });
        }
    }

    results.sort_by(|a, b| a.hop.cmp(&b.hop).then(b.score.total_cmp(&a.score)));
    results.truncate(limit);
    Ok(results)
}

#[derive(Debug, Serialize)]
pub struct AssociationStats {
    pub total_edges: usize,
    pub connected_memories: usize,
    pub avg_weight: f64,
    pub by_type: BTreeMap<String, usize>,
}

pub fn association_stats(conn: &Connection) -> Result<AssociationStats> {
    let (total_edges, avg_weight): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(weight) FROM associations",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let connected_memories: i64 = conn.query_row(
        "SELECT COUNT(*) FROM (SELECT source_id AS id FROM associations \
         UNION SELECT target_id FROM associations)",
        [],
        |row| row.get(0),
    )?;

    let mut by_type = BTreeMap::new();
    let mut stmt =
        conn.prepare("SELECT edge_type, COUNT(*) FROM associations GROUP BY edge_type")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (t, c) = row?;
        by_type.insert(t, c as usize);
    }

    Ok(AssociationStats {
        total_edges: total_edges as usize,
        connected_memories: connected_memories as usize,
        avg_weight: super::round4(avg_weight.unwrap_or(0.0)),
        by_type,
    })
}

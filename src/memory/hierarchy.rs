//! Multi-level summary tree over the memory store.
//!
//! Level 0 holds every live memory. Each higher level clusters the previous
//! level's frontier with a looser distance cutoff and writes one synthetic summary
//! memory per multi-member cluster. Nodes left alone at a level stay in the
//! frontier and can still be grouped at a later level.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::cluster::{agglomerative, centroid};
use super::search::{finish, recall, vector_search, RecallResult};
use super::store::insert_memory;
use super::{load_embeddings, truncate};
use crate::config::HierarchyConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::types::{level_label, DetailLevel, HierarchyNode, MemoryType, NewMemory, RecallStrategy};

const HIERARCHY_SOURCE: &str = super::maintenance::SYNTHETIC_SOURCES[1];

#[derive(Debug, Serialize)]
pub struct HierarchyResult {
    pub total_nodes: usize,
    pub by_level: BTreeMap<u32, usize>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HierarchyStats {
    pub total_nodes: usize,
    /// Summary nodes with no parent.
    pub root_summaries: usize,
    pub by_level: BTreeMap<u32, usize>,
}

#[derive(Debug, Serialize)]
pub struct AdaptiveRecall {
    pub level: u32,
    pub label: &'static str,
    /// `true` when the level was empty and hybrid recall answered instead.
    pub fell_back: bool,
    pub results: Vec<RecallResult>,
}

struct FrontierNode {
    node_id: i64,
    content: String,
    embedding: Vec<f32>,
}

/// Drop the existing tree (and its summary memories) and build a new one.
pub fn build_hierarchy(conn: &mut Connection, config: &HierarchyConfig) -> Result<HierarchyResult> {
    let start = Instant::now();
    let tx = conn.transaction()?;

    let stale: Vec<String> = {
        let mut stmt = tx.prepare("SELECT id FROM memories WHERE source = ?1")?;
        let collected = stmt
            .query_map([HIERARCHY_SOURCE], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };
    for id in &stale {
        super::forget::hard_delete_in(&tx, id)?;
    }
    tx.execute("DELETE FROM memory_hierarchy", [])?;

    let leaves: Vec<(String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, content FROM memories WHERE is_deleted = 0 ORDER BY created_at, id",
        )?;
        let collected = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };
    let ids: Vec<String> = leaves.iter().map(|(id, _)| id.clone()).collect();
    let mut embeddings = load_embeddings(&tx, &ids)?;

    let now = chrono::Utc::now().to_rfc3339();
    let mut by_level: BTreeMap<u32, usize> = BTreeMap::new();
    let mut frontier = Vec::with_capacity(leaves.len());
    for (memory_id, content) in leaves {
        let Some(embedding) = embeddings.remove(&memory_id) else {
            tracing::warn!(id = %memory_id, "memory has no embedding, left out of hierarchy");
            continue;
        };
        let node_id = insert_node(&tx, &memory_id, 0, &truncate(&content, config.snippet_chars), &now)?;
        frontier.push(FrontierNode {
            node_id,
            content,
            embedding,
        });
    }
    by_level.insert(0, frontier.len());

    for level in 1..=config.max_level {
        if frontier.len() < 2 {
            break;
        }
        let vectors: Vec<Vec<f32>> = frontier.iter().map(|n| n.embedding.clone()).collect();
        let clusters = agglomerative(&vectors, config.threshold_for(level));
        if clusters.iter().all(|c| c.len() < 2) {
            break;
        }

        let mut slots: Vec<Option<FrontierNode>> = frontier.into_iter().map(Some).collect();
        let mut next = Vec::with_capacity(clusters.len());
        let mut created = 0;

        for members in clusters {
            if members.len() == 1 {
                if let Some(node) = slots[members[0]].take() {
                    next.push(node);
                }
                continue;
            }

            let children: Vec<FrontierNode> =
                members.iter().filter_map(|&i| slots[i].take()).collect();
            let vecs: Vec<&[f32]> = children.iter().map(|c| c.embedding.as_slice()).collect();
            let embedding = centroid(&vecs);

            let snippets: Vec<String> = children
                .iter()
                .take(config.member_snippets)
                .map(|c| truncate(c.content.trim(), config.snippet_chars))
                .collect();
            let content = format!("[{}] {}", level_label(level), snippets.join(" | "));

            let summary = NewMemory::new(
                content.clone(),
                MemoryType::Semantic,
                HIERARCHY_SOURCE,
                (0.5 + 0.15 * level as f64).min(1.0),
            )?
            .with_metadata(serde_json::json!({
                "hierarchy_level": level,
                "children": children.len(),
            }));
            let (memory_id, _) = insert_memory(&tx, &summary, &embedding)?;
            let node_id = insert_node(&tx, &memory_id, level, &truncate(&content, config.snippet_chars), &now)?;

            for child in &children {
                tx.execute(
                    "UPDATE memory_hierarchy SET parent_id = ?1 WHERE id = ?2",
                    params![node_id, child.node_id],
                )?;
            }

            created += 1;
            next.push(FrontierNode {
                node_id,
                content,
                embedding,
            });
        }

        by_level.insert(level, created);
        tracing::debug!(level, summaries = created, frontier = next.len(), "hierarchy level built");
        frontier = next;
    }

    tx.commit()?;

    let result = HierarchyResult {
        total_nodes: by_level.values().sum(),
        by_level,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(
        total_nodes = result.total_nodes,
        elapsed_ms = result.elapsed_ms,
        "hierarchy rebuilt"
    );
    Ok(result)
}

fn insert_node(conn: &Connection, memory_id: &str, level: u32, summary: &str, now: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO memory_hierarchy (memory_id, parent_id, level, summary, created_at) \
         VALUES (?1, NULL, ?2, ?3, ?4)",
        params![memory_id, level, summary, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All nodes at `level`, oldest first.
pub fn nodes_at_level(conn: &Connection, level: u32) -> Result<Vec<HierarchyNode>> {
    let mut stmt = conn.prepare(
        "SELECT id, memory_id, parent_id, level, summary, created_at \
         FROM memory_hierarchy WHERE level = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([level], |row| {
            Ok(HierarchyNode {
                id: row.get(0)?,
                memory_id: row.get(1)?,
                parent_id: row.get(2)?,
                level: row.get(3)?,
                summary: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn hierarchy_stats(conn: &Connection) -> Result<HierarchyStats> {
    let mut by_level = BTreeMap::new();
    let mut stmt =
        conn.prepare("SELECT level, COUNT(*) FROM memory_hierarchy GROUP BY level ORDER BY level")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (level, count) = row?;
        by_level.insert(level, count as usize);
    }
    let root_summaries: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memory_hierarchy WHERE level > 0 AND parent_id IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(HierarchyStats {
        total_nodes: by_level.values().sum(),
        root_summaries: root_summaries as usize,
        by_level,
    })
}

/// Pick a level from the shape of a query.
///
/// Digits, capitalized names after the first word, or more than six words point at
/// specifics (0). Three words or fewer with no long words read as broad (2).
/// Everything else lands in between (1).
pub fn infer_level(query: &str) -> u32 {
    let words: Vec<&str> = query.split_whitespace().collect();
    let has_digits = query.chars().any(|c| c.is_ascii_digit());
    let has_names = words
        .iter()
        .skip(1)
        .any(|w| w.chars().next().is_some_and(char::is_uppercase));
    let has_long_word = words.iter().any(|w| w.chars().count() > 10);

    if has_digits || has_names || words.len() > 6 {
        0
    } else if words.len() <= 3 && !has_long_word {
        2
    } else {
        1
    }
}

pub fn resolve_level(detail: DetailLevel, query: &str) -> u32 {
    match detail {
        DetailLevel::Auto => infer_level(query),
        DetailLevel::Broad => 2,
        DetailLevel::Specific => 0,
        DetailLevel::Level(l) => l,
    }
}

/// Vector search restricted to one hierarchy level, falling back to hybrid recall
/// when that level holds nothing.
pub fn recall_adaptive(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    detail: DetailLevel,
    limit: usize,
    vec_weight: f64,
) -> Result<AdaptiveRecall> {
    let level = resolve_level(detail, query);
    let embedding = embedder.embed(query)?;
    let hits = vector_search(conn, &embedding, limit, Some(level))?;

    let (fell_back, results) = if hits.is_empty() {
        let results = recall(conn, embedder, query, RecallStrategy::Hybrid, limit, vec_weight)?;
        (true, results)
    } else {
        let scores: HashMap<String, f64> = hits.into_iter().collect();
        (false, finish(conn, scores, limit)?)
    };

    tracing::debug!(level, fell_back, results = results.len(), "adaptive recall");
    Ok(AdaptiveRecall {
        level,
        label: level_label(level),
        fell_back,
        results,
    })
}

//! Read path: keyword, vector and hybrid recall.
//!
//! Every strategy only sees memories with `is_deleted = 0`. Returned memories get
//! their `access_count` bumped and `last_accessed` set, which slows their decay.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

use crate::embedding::EmbeddingProvider;
use crate::memory::types::{Memory, RecallStrategy, MEMORY_COLUMNS};

/// A recalled memory and its blended score.
#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    #[serde(flatten)]
    pub memory: Memory,
    pub score: f64,
}

/// Recall up to `limit` memories for `query`.
///
/// Each side contributes `limit * 2` candidates. Hybrid scores are
/// `vec_weight * vector + (1 - vec_weight) * keyword`, with a missing side counted as 0.
pub fn recall(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    strategy: RecallStrategy,
    limit: usize,
    vec_weight: f64,
) -> Result<Vec<RecallResult>> {
    if limit == 0 || query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let candidates = limit * 2;

    let scores: HashMap<String, f64> = match strategy {
        RecallStrategy::Keyword => keyword_search(conn, query, candidates)?.into_iter().collect(),
        RecallStrategy::Vector => {
            let embedding = embedder.embed(query)?;
            vector_search(conn, &embedding, candidates, None)?
                .into_iter()
                .collect()
        }
        RecallStrategy::Hybrid => {
            let embedding = embedder.embed(query)?;
            let vec_hits = vector_search(conn, &embedding, candidates, None)?;
            let kw_hits = keyword_search(conn, query, candidates)?;
            blend(&vec_hits, &kw_hits, vec_weight)
        }
    };

    let ranked = finish(conn, scores, limit)?;
    tracing::debug!(
        query_len = query.len(),
        strategy = ?strategy,
        results = ranked.len(),
        "recall complete"
    );
    Ok(ranked)
}

/// Hydrate scored ids, rank them, keep `limit`, and record the access.
pub(crate) fn finish(
    conn: &Connection,
    scores: HashMap<String, f64>,
    limit: usize,
) -> Result<Vec<RecallResult>> {
    let ids: Vec<String> = scores.keys().cloned().collect();
    let mut memories = fetch_memories(conn, &ids)?;

    let mut results: Vec<RecallResult> = scores
        .into_iter()
        .filter_map(|(id, score)| {
            memories.remove(&id).map(|memory| RecallResult {
                memory,
                score: super::round4(score),
            })
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    results.truncate(limit);

    let returned: Vec<&str> = results.iter().map(|r| r.memory.id.as_str()).collect();
    let now = update_access(conn, &returned)?;
    for r in &mut results {
        r.memory.access_count += 1;
        r.memory.last_accessed = Some(now.clone());
    }
    Ok(results)
}

pub(crate) fn blend(
    vec_hits: &[(String, f64)],
    kw_hits: &[(String, f64)],
    vec_weight: f64,
) -> HashMap<String, f64> {
    let mut combined: HashMap<String, (f64, f64)> = HashMap::new();
    for (id, s) in vec_hits {
        combined.entry(id.clone()).or_default().0 = *s;
    }
    for (id, s) in kw_hits {
        combined.entry(id.clone()).or_default().1 = *s;
    }
    combined
        .into_iter()
        .map(|(id, (v, k))| (id, vec_weight * v + (1.0 - vec_weight) * k))
        .collect()
}

// ── Scans ─────────────────────────────────────────────────────────────────────

/// Exact cosine scan over live embeddings. Returns `(id, similarity)` best first.
///
/// With `level`, only memories placed at that hierarchy level are considered.
pub(crate) fn vector_search(
    conn: &Connection,
    embedding: &[f32],
    limit: usize,
    level: Option<u32>,
) -> Result<Vec<(String, f64)>> {
    let bytes = super::embedding_to_bytes(embedding);
    let mut out = Vec::new();
    match level {
        None => {
            let mut stmt = conn.prepare(
                "SELECT v.id, vec_distance_cosine(v.embedding, ?1) AS distance \
                 FROM memories_vec v JOIN memories m ON m.id = v.id \
                 WHERE m.is_deleted = 0 ORDER BY distance LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![bytes, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            for row in rows {
                let (id, distance) = row?;
                out.push((id, 1.0 - distance));
            }
        }
        Some(level) => {
            let mut stmt = conn.prepare(
                "SELECT v.id, vec_distance_cosine(v.embedding, ?1) AS distance \
                 FROM memories_vec v \
                 JOIN memories m ON m.id = v.id \
                 WHERE m.is_deleted = 0 \
                   AND v.id IN (SELECT memory_id FROM memory_hierarchy WHERE level = ?3) \
                 ORDER BY distance LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![bytes, limit as i64, level as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            for row in rows {
                let (id, distance) = row?;
                out.push((id, 1.0 - distance));
            }
        }
    }
    Ok(out)
}

/// FTS5 BM25 search with scores rescaled into `[0, 1]`, best match = 1.
///
/// FTS5 rank is negative (more negative = better), so magnitudes are divided by
/// the largest magnitude in the result set.
pub(crate) fn keyword_search(
    conn: &Connection,
    query: &str,
    limit: usize,
) -> Result<Vec<(String, f64)>> {
    let escaped = escape_fts_query(query);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, rank FROM memories_fts \
         WHERE memories_fts MATCH ?1 \
           AND rowid IN (SELECT rowid FROM memories WHERE is_deleted = 0) \
         ORDER BY rank LIMIT ?2",
    )?;
    let raw = stmt
        .query_map(params![escaped, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let max = raw.iter().map(|(_, r)| r.abs()).fold(0.0f64, f64::max);
    Ok(raw
        .into_iter()
        .map(|(id, rank)| {
            let score = if max > 0.0 { rank.abs() / max } else { 1.0 };
            (id, score)
        })
        .collect())
}

/// Quote every whitespace-delimited word so FTS5 treats them as plain terms (implicit AND).
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "")))
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Row access ────────────────────────────────────────────────────────────────

/// Fetch live memories by id.
pub fn fetch_memories(conn: &Connection, ids: &[String]) -> Result<HashMap<String, Memory>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM memories WHERE is_deleted = 0 AND id IN ({})",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), Memory::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|m| (m.id.clone(), m)).collect())
}

/// Fetch one memory by id, deleted or not.
pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<Memory>> {
    use rusqlite::OptionalExtension;
    let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], Memory::from_row).optional()?)
}

/// Bump access counters. Returns the timestamp written.
fn update_access(conn: &Connection, ids: &[&str]) -> Result<String> {
    let now = chrono::Utc::now().to_rfc3339();
    if ids.is_empty() {
        return Ok(now);
    }
    let mut stmt = conn.prepare(
        "UPDATE memories SET access_count = access_count + 1, last_accessed = ?1 WHERE id = ?2",
    )?;
    for id in ids {
        stmt.execute(params![now, id])?;
    }
    Ok(now)
}

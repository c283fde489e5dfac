//! Memory upkeep: strength decay, clustering of recent memories, and
//! consolidation of each cluster into a semantic summary.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::time::Instant;

use super::store::{insert_memory, write_audit_log};
use super::{cluster, load_embeddings, truncate};
use crate::config::MaintenanceConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::types::{MemoryType, NewMemory};

/// Sources of machine-written summaries; kept out of clustering so summaries never re-summarize.
pub(crate) const SYNTHETIC_SOURCES: [&str; 2] = ["consolidation", "hierarchy"];

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct DecayResult {
    pub decayed: usize,
    /// Dropped below the strength floor and soft-deleted.
    pub deleted: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryCluster {
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsolidateResult {
    pub decay: DecayResult,
    pub clusters_found: usize,
    pub summaries_created: usize,
    pub associations_created: usize,
    pub elapsed_ms: u64,
}

// ── Strength Decay ───────────────────────────────────────────────────────────

/// Per-day retention rate for a memory: type base plus rehearsal bonus, capped.
pub fn decay_rate(config: &MaintenanceConfig, memory_type: MemoryType, access_count: u32) -> f64 {
    let bonus = (access_count as f64 * config.rehearsal_per_access).min(config.rehearsal_cap);
    (config.base_rate(memory_type) + bonus).min(config.max_rate)
}

/// Decay every active memory by `rate^days` since its last access.
///
/// Memories touched within `min_days` are left alone. Anything that lands under
/// `strength_floor` is soft-deleted.
pub fn apply_decay(conn: &mut Connection, config: &MaintenanceConfig) -> Result<DecayResult> {
    apply_decay_at(conn, config, Utc::now())
}

fn apply_decay_at(
    conn: &mut Connection,
    config: &MaintenanceConfig,
    now: DateTime<Utc>,
) -> Result<DecayResult> {
    let tx = conn.transaction()?;
    let rows: Vec<(String, String, f64, u32, Option<String>, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, memory_type, strength, access_count, last_accessed, created_at \
             FROM memories WHERE is_deleted = 0",
        )?;
        let collected = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let mut result = DecayResult::default();
    for (id, type_str, strength, access_count, last_accessed, created_at) in rows {
        let anchor = last_accessed.as_deref().unwrap_or(&created_at);
        let (Ok(memory_type), Ok(anchor)) = (
            type_str.parse::<MemoryType>(),
            DateTime::parse_from_rfc3339(anchor),
        ) else {
            tracing::warn!(id = %id, "skipping decay for memory with unreadable type or timestamp");
            result.unchanged += 1;
            continue;
        };

        let days = (now - anchor.with_timezone(&Utc)).num_seconds() as f64 / 86_400.0;
        if days < config.min_days {
            result.unchanged += 1;
            continue;
        }

        let rate = decay_rate(config, memory_type, access_count);
        let new_strength = strength * rate.powf(days);

        if new_strength < config.strength_floor {
            tx.execute(
                "UPDATE memories SET strength = ?1, is_deleted = 1 WHERE id = ?2",
                params![new_strength, id],
            )?;
            write_audit_log(
                &tx,
                "decay",
                &id,
                Some(&serde_json::json!({"strength": new_strength, "deleted": true})),
            )?;
            result.deleted += 1;
        } else {
            tx.execute(
                "UPDATE memories SET strength = ?1 WHERE id = ?2",
                params![new_strength, id],
            )?;
            result.decayed += 1;
        }
    }
    tx.commit()?;

    tracing::info!(
        decayed = result.decayed,
        deleted = result.deleted,
        unchanged = result.unchanged,
        "decay pass complete"
    );
    Ok(result)
}

// ── Clustering ───────────────────────────────────────────────────────────────

/// Cluster memories created in the last `days` days. Only clusters of two or more are returned.
pub fn cluster_memories(conn: &Connection, days: f64, threshold: f64) -> Result<Vec<MemoryCluster>> {
    let cutoff = window_start(Utc::now(), days);
    let ids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM memories \
             WHERE is_deleted = 0 AND created_at >= ?1 AND source NOT IN (?2, ?3) \
             ORDER BY created_at, id",
        )?;
        let collected = stmt
            .query_map(
                params![cutoff.to_rfc3339(), SYNTHETIC_SOURCES[0], SYNTHETIC_SOURCES[1]],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let embeddings = load_embeddings(conn, &ids)?;
    let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = ids
        .into_iter()
        .filter_map(|id| embeddings.get(&id).cloned().map(|v| (id, v)))
        .unzip();

    let clusters = cluster::agglomerative(&vectors, threshold)
        .into_iter()
        .filter(|members| members.len() >= 2)
        .map(|members| MemoryCluster {
            member_ids: members.into_iter().map(|i| ids[i].clone()).collect(),
        })
        .collect();
    Ok(clusters)
}

/// Start of a trailing window of `days` days. Windows reaching past the
/// representable range start at the earliest representable instant.
fn window_start(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let secs = (days.max(0.0) * 86_400.0).min(i64::MAX as f64) as i64;
    chrono::Duration::try_seconds(secs)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ── Consolidation ────────────────────────────────────────────────────────────

/// Decay, cluster recent memories, then write one semantic summary per cluster
/// and link the cluster's members pairwise.
///
/// The steps commit separately; a concurrent reader can observe the store between them.
pub fn consolidate(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    config: &MaintenanceConfig,
    days: f64,
) -> Result<ConsolidateResult> {
    let start = Instant::now();
    let decay = apply_decay(conn, config)?;
    let clusters = cluster_memories(conn, days, config.cluster_threshold)?;

    let mut summaries_created = 0;
    let mut associations_created = 0;

    for c in &clusters {
        let members = super::search::fetch_memories(conn, &c.member_ids)?;

        let mut snippets: Vec<String> = Vec::new();
        let mut max_importance = 0.0f64;
        for id in &c.member_ids {
            let Some(m) = members.get(id) else { continue };
            max_importance = max_importance.max(m.importance);
            let snippet = truncate(m.content.trim(), config.snippet_chars);
            if !snippets.contains(&snippet) {
                snippets.push(snippet);
            }
        }
        snippets.truncate(config.max_snippets);
        if snippets.is_empty() {
            continue;
        }

        let content = format!(
            "Consolidated from {} memories:\n- {}",
            c.member_ids.len(),
            snippets.join("\n- ")
        );
        let summary = NewMemory::new(
            content,
            MemoryType::Semantic,
            SYNTHETIC_SOURCES[0],
            (max_importance + 0.1).min(1.0),
        )?
        .with_metadata(serde_json::json!({"summary_of": c.member_ids}));
        let embedding = embedder.embed(&summary.content)?;

        let tx = conn.transaction()?;
        let (summary_id, _) = insert_memory(&tx, &summary, &embedding)?;
        write_audit_log(
            &tx,
            "consolidate",
            &summary_id,
            Some(&serde_json::json!({"members": c.member_ids})),
        )?;
        associations_created += super::associations::build_cluster_associations(&tx, &c.member_ids)?;
        tx.commit()?;
        summaries_created += 1;
    }

    let result = ConsolidateResult {
        decay,
        clusters_found: clusters.len(),
        summaries_created,
        associations_created,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(
        clusters = result.clusters_found,
        summaries = result.summaries_created,
        associations = result.associations_created,
        elapsed_ms = result.elapsed_ms,
        "consolidation complete"
    );
    Ok(result)
}

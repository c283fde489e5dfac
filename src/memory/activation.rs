//! Spreading activation over the association graph, and recall primed by it.

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::associations::{neighbors, Neighbor};
use super::search::{fetch_memories, recall, RecallResult};
use super::round4;
use crate::config::ActivationConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::types::{Memory, RecallStrategy};

/// Hits pulled per context item when seeding from conversation context.
const CONTEXT_RECALL_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Direct,
    Activation,
}

#[derive(Debug, Serialize)]
pub struct PrimedResult {
    #[serde(flatten)]
    pub memory: Memory,
    /// Hybrid recall score; `None` for memories reached only through activation.
    pub direct_score: Option<f64>,
    pub activation: f64,
    pub final_score: f64,
    pub via: Via,
}

/// Propagate unit activation from `seeds` along association edges.
///
/// Each iteration, every active node pushes `activation * weight * edge multiplier * decay`
/// to its neighbors. A node keeps the max of what reaches it, capped at 1.0. Afterwards
/// any node with a neighbor more than `inhibition_ratio` times as active is scaled by
/// `inhibition_factor`.
pub fn spreading_activation(
    conn: &Connection,
    seeds: &[String],
    config: &ActivationConfig,
) -> Result<HashMap<String, f64>> {
    let mut activation: HashMap<String, f64> = seeds.iter().map(|s| (s.clone(), 1.0)).collect();
    let mut graph: HashMap<String, Vec<Neighbor>> = HashMap::new();

    for _ in 0..config.iterations {
        let snapshot: Vec<(String, f64)> = activation
            .iter()
            .filter(|(_, a)| **a > 0.0)
            .map(|(id, a)| (id.clone(), *a))
            .collect();

        let mut changed = false;
        for (id, a) in snapshot {
            if !graph.contains_key(&id) {
                graph.insert(id.clone(), neighbors(conn, &id)?);
            }
            let Some(edges) = graph.get(&id) else { continue };
            for edge in edges {
                let spread = (a * edge.weight * config.edge_multiplier(edge.edge_type) * config.decay)
                    .min(1.0);
                let slot = activation.entry(edge.memory_id.clone()).or_insert(0.0);
                if spread > *slot {
                    *slot = spread;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    for id in activation.keys() {
        if !graph.contains_key(id) {
            graph.insert(id.clone(), neighbors(conn, id)?);
        }
    }

    // Lateral inhibition against the pre-inhibition values
    let before = activation.clone();
    for (id, a) in activation.iter_mut() {
        let Some(edges) = graph.get(id) else { continue };
        let suppressed = edges.iter().any(|e| {
            before
                .get(&e.memory_id)
                .is_some_and(|&other| other > *a * config.inhibition_ratio)
        });
        if suppressed {
            *a *= config.inhibition_factor;
        }
    }

    activation.retain(|_, a| *a > 0.0);
    tracing::debug!(seeds = seeds.len(), active = activation.len(), "activation spread");
    Ok(activation)
}

/// Hybrid recall re-weighted by activation seeded from the query hits and the
/// most recent `context` items.
///
/// Only hits with a positive score count as direct or as seeds. Direct hits score
/// `direct_weight * score + (1 - direct_weight) * activation`.
/// Memories the query missed but that end up above `injection_threshold` are
/// added with only the activation term.
pub fn primed_recall(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    context: &[String],
    limit: usize,
    vec_weight: f64,
    config: &ActivationConfig,
) -> Result<Vec<PrimedResult>> {
    let direct = matching(recall(conn, embedder, query, RecallStrategy::Hybrid, limit, vec_weight)?);

    let mut seeds: Vec<String> = direct.iter().map(|r| r.memory.id.clone()).collect();
    let recent = context.len().saturating_sub(config.context_items);
    for item in &context[recent..] {
        let hits = matching(recall(
            conn,
            embedder,
            item,
            RecallStrategy::Hybrid,
            CONTEXT_RECALL_LIMIT,
            vec_weight,
        )?);
        for hit in hits {
            if !seeds.contains(&hit.memory.id) {
                seeds.push(hit.memory.id);
            }
        }
    }

    let activation = spreading_activation(conn, &seeds, config)?;
    let indirect_weight = 1.0 - config.direct_weight;

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(limit);
    for hit in direct {
        let a = activation.get(&hit.memory.id).copied().unwrap_or(0.0);
        seen.insert(hit.memory.id.clone());
        results.push(PrimedResult {
            final_score: round4(config.direct_weight * hit.score + indirect_weight * a),
            direct_score: Some(hit.score),
            activation: round4(a),
            via: Via::Direct,
            memory: hit.memory,
        });
    }

    let injected: Vec<String> = activation
        .iter()
        .filter(|(id, a)| **a > config.injection_threshold && !seen.contains(*id))
        .map(|(id, _)| id.clone())
        .collect();
    let mut memories = fetch_memories(conn, &injected)?;
    for id in injected {
        let Some(memory) = memories.remove(&id) else { continue };
        let a = activation.get(&id).copied().unwrap_or(0.0);
        results.push(PrimedResult {
            memory,
            direct_score: None,
            activation: round4(a),
            final_score: round4(indirect_weight * a),
            via: Via::Activation,
        });
    }

    results.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    results.truncate(limit);
    tracing::debug!(
        query_len = query.len(),
        context = context.len(),
        results = results.len(),
        "primed recall complete"
    );
    Ok(results)
}

/// Recall hits that matched at all; zero-score rows would otherwise seed full activation.
fn matching(hits: Vec<RecallResult>) -> Vec<RecallResult> {
    hits.into_iter().filter(|r| r.score > 0.0).collect()
}

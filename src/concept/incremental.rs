//! Real-time index update for newly stored content.
//!
//! Only existing anchors gain entries; the vocabulary changes on full rebuilds alone.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use super::artifact::{load, save_atomic, AnchorEmbeddings, ConceptIndex};
use super::builder::entry_for;
use super::chunker::{chunk_text, relative_path};
use super::lookup::LookupEngine;
use crate::config::HippocampusConfig;
use crate::embedding::{cosine_similarity, truncate_chars, EmbeddingProvider};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    pub chunks_added: usize,
    /// Anchors whose entry list changed.
    pub anchors_updated: usize,
    pub elapsed_ms: f64,
}

/// Source label for a relative path: its first segment, or `unknown` without a `/`.
pub fn source_of(path: &str) -> &str {
    match path.split_once('/') {
        Some((first, _)) => first,
        None => "unknown",
    }
}

/// Fold `content` stored at `path` into the persisted index.
///
/// Without an index and anchor embeddings on disk this does nothing and returns
/// zero counts. `lookup`, when given, is invalidated after a successful write.
pub fn incremental_update(
    workspace: &Path,
    config: &HippocampusConfig,
    embedder: &dyn EmbeddingProvider,
    content: &str,
    path: &str,
    lookup: Option<&LookupEngine>,
) -> Result<UpdateResult> {
    let start = Instant::now();
    let cfg = &config.index;
    let index_file = cfg.index_file(workspace);

    let Some(mut index) = load::<ConceptIndex>(&index_file)? else {
        tracing::debug!(path = %index_file.display(), "no index, skipping incremental update");
        return Ok(UpdateResult::default());
    };
    let Some(embeds) = load::<AnchorEmbeddings>(&cfg.embeds_file(workspace))? else {
        tracing::debug!("no anchor embeddings, skipping incremental update");
        return Ok(UpdateResult::default());
    };

    let chunks = chunk_text(content, path, source_of(path), &config.chunking);
    if chunks.is_empty() {
        tracing::debug!(path, "no chunks in new content");
        return Ok(UpdateResult::default());
    }

    let texts: Vec<&str> = chunks
        .iter()
        .map(|c| truncate_chars(&c.text, cfg.embed_chars))
        .collect();
    let vecs = embedder.embed_batch(&texts)?;
    if vecs.len() != chunks.len() {
        bail!("embedding server returned the wrong number of vectors");
    }

    let mut anchors_updated = 0;
    for (anchor, anchor_vec) in embeds.iter() {
        let Some(list) = index.0.get_mut(anchor) else { continue };
        let mut changed = false;
        for (chunk, vec) in chunks.iter().zip(&vecs) {
            let score = cosine_similarity(anchor_vec, vec);
            if score >= cfg.theta {
                changed |= list.upsert(entry_for(chunk, score, cfg.preview_chars), cfg.k_max);
            }
        }
        if changed {
            anchors_updated += 1;
        }
    }

    save_atomic(&index_file, &index)?;
    if let Some(engine) = lookup {
        engine.invalidate();
    }

    let result = UpdateResult {
        chunks_added: chunks.len(),
        anchors_updated,
        elapsed_ms: (start.elapsed().as_secs_f64() * 10_000.0).round() / 10.0,
    };
    tracing::info!(
        path,
        chunks = result.chunks_added,
        anchors = result.anchors_updated,
        elapsed_ms = result.elapsed_ms,
        "incremental index update"
    );
    Ok(result)
}

/// Read `file` and run [`incremental_update`] with its workspace-relative path.
pub fn incremental_update_file(
    workspace: &Path,
    config: &HippocampusConfig,
    embedder: &dyn EmbeddingProvider,
    file: &Path,
    lookup: Option<&LookupEngine>,
) -> Result<UpdateResult> {
    let content = std::fs::read_to_string(file)?;
    let rel = relative_path(file, workspace);
    incremental_update(workspace, config, embedder, &content, &rel, lookup)
}

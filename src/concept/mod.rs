//! Anchor concept index: a pre-computed anchor→chunk map over the workspace's
//! markdown, rebuilt in full by [`builder`], extended per stored item by
//! [`incremental`], and served at inference time by [`lookup`].

pub mod anchors;
pub mod artifact;
pub mod builder;
pub mod chunker;
pub mod incremental;
pub mod lookup;
pub mod ranked;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::config::IndexConfig;
use artifact::{load, BuildMeta, ConceptIndex};

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub index_exists: bool,
    pub embeds_exists: bool,
    pub anchors: usize,
    pub total_entries: usize,
    pub avg_entries_per_anchor: f64,
    pub meta: Option<BuildMeta>,
}

/// Summarize the artifacts currently on disk.
pub fn index_status(workspace: &Path, config: &IndexConfig) -> Result<IndexStatus> {
    let index: Option<ConceptIndex> = load(&config.index_file(workspace))?;
    let meta: Option<BuildMeta> = load(&config.meta_file(workspace))?;

    let (anchors, total_entries) = index
        .as_ref()
        .map_or((0, 0), |i| (i.len(), i.total_entries()));
    let avg_entries_per_anchor = if anchors > 0 {
        ((total_entries as f64 / anchors as f64) * 10.0).round() / 10.0
    } else {
        0.0
    };

    Ok(IndexStatus {
        index_exists: index.is_some(),
        embeds_exists: config.embeds_file(workspace).exists(),
        anchors,
        total_entries,
        avg_entries_per_anchor,
        meta,
    })
}

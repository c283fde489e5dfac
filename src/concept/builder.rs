//! Full rebuild of the concept index.
//!
//! Discover → chunk → extract anchors → embed both sides → one anchor×chunk
//! cosine matrix → top-K per anchor above theta → write the three artifacts.

use anyhow::{bail, Result};
use ndarray::{Array2, Axis};
use std::path::Path;
use std::time::Instant;

use super::anchors::extract_anchors;
use super::artifact::{save_atomic, AnchorEmbeddings, BuildMeta, ConceptIndex};
use super::chunker::{chunk_file, discover_files, Chunk};
use super::ranked::{IndexEntry, RankedList};
use crate::config::HippocampusConfig;
use crate::embedding::{truncate_chars, EmbeddingProvider};

/// Progress notifications for callers that show a spinner.
#[derive(Debug, Clone, Copy)]
pub enum BuildStage {
    Discovered { files: usize },
    Chunked { chunks: usize },
    Vocabulary { anchors: usize, multi_word: usize },
    EmbeddingAnchors { count: usize },
    EmbeddingChunks { count: usize },
    Scoring { anchors: usize, chunks: usize },
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered { files } => write!(f, "found {files} files"),
            Self::Chunked { chunks } => write!(f, "extracted {chunks} chunks"),
            Self::Vocabulary { anchors, multi_word } => {
                write!(f, "vocabulary: {anchors} anchors ({multi_word} multi-word)")
            }
            Self::EmbeddingAnchors { count } => write!(f, "embedding {count} anchors"),
            Self::EmbeddingChunks { count } => write!(f, "embedding {count} chunks"),
            Self::Scoring { anchors, chunks } => {
                write!(f, "scoring {anchors}x{chunks} similarity matrix")
            }
        }
    }
}

#[derive(Debug)]
pub struct BuildOutput {
    pub index: ConceptIndex,
    pub meta: BuildMeta,
}

/// Rebuild the index for `workspace` from scratch and persist it.
///
/// An empty corpus or empty vocabulary still writes (empty) artifacts.
pub fn build_index(
    workspace: &Path,
    config: &HippocampusConfig,
    embedder: &dyn EmbeddingProvider,
    progress: &dyn Fn(BuildStage),
) -> Result<BuildOutput> {
    let start = Instant::now();
    let cfg = &config.index;

    let files = discover_files(workspace, cfg);
    progress(BuildStage::Discovered { files: files.len() });

    let chunks: Vec<Chunk> = files
        .iter()
        .flat_map(|f| chunk_file(f, workspace, &config.chunking))
        .collect();
    progress(BuildStage::Chunked {
        chunks: chunks.len(),
    });

    let anchors = if chunks.is_empty() {
        Vec::new()
    } else {
        let entities = workspace.join(&cfg.entities_dir);
        extract_anchors(&chunks, Some(&entities), &config.anchors)
    };
    progress(BuildStage::Vocabulary {
        anchors: anchors.len(),
        multi_word: anchors.iter().filter(|a| a.contains(' ')).count(),
    });

    if anchors.is_empty() {
        tracing::info!(files = files.len(), chunks = chunks.len(), "nothing to index, writing empty index");
        return persist(
            workspace,
            config,
            ConceptIndex::default(),
            AnchorEmbeddings::default(),
            files.len(),
            chunks.len(),
            start,
        );
    }

    progress(BuildStage::EmbeddingAnchors {
        count: anchors.len(),
    });
    let anchor_refs: Vec<&str> = anchors.iter().map(String::as_str).collect();
    let anchor_vecs = embedder.embed_batch(&anchor_refs)?;

    progress(BuildStage::EmbeddingChunks {
        count: chunks.len(),
    });
    let chunk_refs: Vec<&str> = chunks
        .iter()
        .map(|c| truncate_chars(&c.text, cfg.embed_chars))
        .collect();
    let chunk_vecs = embedder.embed_batch(&chunk_refs)?;
    if anchor_vecs.len() != anchors.len() || chunk_vecs.len() != chunks.len() {
        bail!("embedding server returned the wrong number of vectors");
    }

    progress(BuildStage::Scoring {
        anchors: anchors.len(),
        chunks: chunks.len(),
    });
    let sims = similarity_matrix(&anchor_vecs, &chunk_vecs)?;

    let mut index = ConceptIndex::default();
    for (i, anchor) in anchors.iter().enumerate() {
        let row = sims.row(i).to_vec();
        let entries: Vec<IndexEntry> = top_k(&row, cfg.k)
            .into_iter()
            .filter(|&(_, score)| score >= cfg.theta)
            .map(|(j, score)| entry_for(&chunks[j], score, cfg.preview_chars))
            .collect();
        if !entries.is_empty() {
            index.0.insert(anchor.clone(), RankedList::from_ranked(entries));
        }
    }

    let embeddings = AnchorEmbeddings {
        anchors,
        embeddings: anchor_vecs,
    };
    persist(workspace, config, index, embeddings, files.len(), chunks.len(), start)
}

fn persist(
    workspace: &Path,
    config: &HippocampusConfig,
    index: ConceptIndex,
    embeddings: AnchorEmbeddings,
    n_files: usize,
    n_chunks: usize,
    start: Instant,
) -> Result<BuildOutput> {
    let cfg = &config.index;
    save_atomic(&cfg.index_file(workspace), &index)?;
    save_atomic(&cfg.embeds_file(workspace), &embeddings)?;

    let meta = BuildMeta {
        built_at: chrono::Utc::now().to_rfc3339(),
        n_anchors: index.len(),
        n_chunks,
        n_files,
        multi_word_anchors: index.anchors().filter(|a| a.contains(' ')).count(),
        build_time_s: (start.elapsed().as_secs_f64() * 100.0).round() / 100.0,
    };
    save_atomic(&cfg.meta_file(workspace), &meta)?;

    tracing::info!(
        anchors = meta.n_anchors,
        entries = index.total_entries(),
        chunks = n_chunks,
        files = n_files,
        build_time_s = meta.build_time_s,
        "concept index built"
    );
    Ok(BuildOutput { index, meta })
}

/// Cosine similarity of every row of `a` against every row of `b`.
pub fn similarity_matrix(a: &[Vec<f32>], b: &[Vec<f32>]) -> Result<Array2<f32>> {
    let a = normalized_rows(a)?;
    let b = normalized_rows(b)?;
    if a.ncols() != b.ncols() {
        bail!("embedding dimension mismatch: {} vs {}", a.ncols(), b.ncols());
    }
    Ok(a.dot(&b.t()))
}

fn normalized_rows(rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    let dim = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != dim) {
        bail!("embeddings have inconsistent dimensions");
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    let mut m = Array2::from_shape_vec((rows.len(), dim), flat)?;
    for mut row in m.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
    Ok(m)
}

/// Indices of the `k` highest scores, best first; equal scores keep index order.
pub(crate) fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

pub(crate) fn entry_for(chunk: &Chunk, score: f32, preview_chars: usize) -> IndexEntry {
    IndexEntry {
        path: chunk.path.clone(),
        line: chunk.start_line,
        score: round4(score),
        source: chunk.source.clone(),
        preview: preview(&chunk.text, preview_chars),
    }
}

/// First `max_chars` characters with newlines flattened to spaces.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    truncate_chars(text, max_chars).replace('\n', " ")
}

fn round4(x: f32) -> f32 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_cosine() {
        let a = vec![vec![2.0, 0.0], vec![1.0, 1.0]];
        let b = vec![vec![0.0, 3.0], vec![5.0, 0.0]];
        let m = similarity_matrix(&a, &b).unwrap();
        assert_eq!(m.dim(), (2, 2));
        assert!((m[[0, 0]] - 0.0).abs() < 1e-6);
        assert!((m[[0, 1]] - 1.0).abs() < 1e-6);
        assert!((m[[1, 0]] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_fail() {
        let a = vec![vec![1.0, 0.0]];
        let b = vec![vec![1.0, 0.0, 0.0]];
        assert!(similarity_matrix(&a, &b).is_err());
    }

    #[test]
    fn top_k_is_stable_on_ties() {
        let ranked = top_k(&[0.5, 0.9, 0.5, 0.1], 3);
        assert_eq!(ranked, vec![(1, 0.9), (0, 0.5), (2, 0.5)]);
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("a\nb\nc", 3), "a b");
    }
}

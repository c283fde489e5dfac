//! Inference-time lookup against the persisted concept index.
//!
//! The engine owns its index and anchor-embedding caches. They load lazily on
//! first use and stay in memory until [`LookupEngine::invalidate`].

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Instant;

use super::artifact::{load, AnchorEmbeddings, ConceptIndex};
use super::ranked::IndexEntry;
use crate::config::{IndexConfig, LookupConfig};
use crate::embedding::{cosine_similarity, EmbeddingProvider};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid token regex"));

/// One chunk returned for a query.
#[derive(Debug, Clone, Serialize)]
pub struct LookupHit {
    #[serde(flatten)]
    pub entry: IndexEntry,
    pub matched_anchor: String,
    /// `anchor_weight * score + (1 - anchor_weight) * cos(query, preview)`.
    pub final_score: f32,
    pub lookup_ms: f64,
}

pub struct LookupEngine {
    index_path: PathBuf,
    embeds_path: PathBuf,
    config: LookupConfig,
    index: RwLock<Option<Arc<ConceptIndex>>>,
    anchor_embeds: RwLock<Option<Arc<AnchorEmbeddings>>>,
}

impl LookupEngine {
    pub fn new(workspace: &Path, index: &IndexConfig, config: LookupConfig) -> Self {
        Self {
            index_path: index.index_file(workspace),
            embeds_path: index.embeds_file(workspace),
            config,
            index: RwLock::new(None),
            anchor_embeds: RwLock::new(None),
        }
    }

    /// Drop both caches; the next lookup reloads from disk.
    pub fn invalidate(&self) {
        if let Ok(mut index) = self.index.write() {
            *index = None;
        }
        if let Ok(mut embeds) = self.anchor_embeds.write() {
            *embeds = None;
        }
        tracing::debug!("lookup cache invalidated");
    }

    pub fn is_loaded(&self) -> bool {
        self.index.read().map(|i| i.is_some()).unwrap_or(false)
    }

    fn load_index(&self) -> Result<Option<Arc<ConceptIndex>>> {
        cached_load(&self.index, &self.index_path)
    }

    fn load_anchor_embeds(&self) -> Result<Option<Arc<AnchorEmbeddings>>> {
        cached_load(&self.anchor_embeds, &self.embeds_path)
    }

    /// Find index entries relevant to `query`.
    ///
    /// Anchors are detected lexically, optionally expanded by embedding similarity,
    /// and extended with any `project_anchors` the index knows. Candidates are
    /// deduplicated by path and re-ranked against the query. A missing index or
    /// no detected anchors yields an empty list.
    pub fn lookup(
        &self,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        project_anchors: &[String],
        semantic: bool,
    ) -> Result<Vec<LookupHit>> {
        let start = Instant::now();
        let Some(index) = self.load_index()? else {
            return Ok(Vec::new());
        };
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let lowered = query.to_lowercase();
        let mut detected = detect_lexical(&index, &lowered);

        let mut query_vec: Option<Vec<f32>> = None;
        if semantic && self.config.semantic && self.config.sem_theta > 0.0 {
            if let Some(embeds) = self.load_anchor_embeds()? {
                if !embeds.is_empty() {
                    let qv = embedder.embed(query)?;
                    for (anchor, vec) in embeds.iter() {
                        if index.contains(anchor)
                            && !detected.contains(anchor)
                            && cosine_similarity(&qv, vec) >= self.config.sem_theta
                        {
                            detected.insert(anchor.to_string());
                        }
                    }
                    query_vec = Some(qv);
                }
            }
        }

        for anchor in project_anchors {
            let anchor = anchor.to_lowercase();
            if index.contains(&anchor) {
                detected.insert(anchor);
            }
        }

        if detected.is_empty() {
            tracing::debug!(query_len = query.len(), "no anchors detected");
            return Ok(Vec::new());
        }

        let mut candidates: HashMap<String, (IndexEntry, String)> = HashMap::new();
        for anchor in &detected {
            let Some(list) = index.get(anchor) else { continue };
            for entry in list.entries() {
                let better = candidates
                    .get(&entry.path)
                    .map_or(true, |(best, _)| entry.score > best.score);
                if better {
                    candidates.insert(entry.path.clone(), (entry.clone(), anchor.clone()));
                }
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = match query_vec {
            Some(v) => v,
            None => embedder.embed(query)?,
        };
        let w = self.config.anchor_weight;
        let mut hits = Vec::with_capacity(candidates.len());
        for (_, (entry, matched_anchor)) in candidates {
            let preview_vec = embedder.embed(&entry.preview)?;
            let rerank = cosine_similarity(&query_vec, &preview_vec);
            let final_score = round4(w * entry.score + (1.0 - w) * rerank);
            hits.push(LookupHit {
                entry,
                matched_anchor,
                final_score,
                lookup_ms: 0.0,
            });
        }

        hits.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.entry.path.cmp(&b.entry.path))
        });
        hits.truncate(self.config.max_chunks);

        let elapsed = (start.elapsed().as_secs_f64() * 10_000.0).round() / 10.0;
        for hit in &mut hits {
            hit.lookup_ms = elapsed;
        }
        tracing::debug!(
            anchors = detected.len(),
            results = hits.len(),
            lookup_ms = elapsed,
            "lookup complete"
        );
        Ok(hits)
    }
}

fn cached_load<T: serde::de::DeserializeOwned>(
    slot: &RwLock<Option<Arc<T>>>,
    path: &Path,
) -> Result<Option<Arc<T>>> {
    if let Some(cached) = slot
        .read()
        .map_err(|e| anyhow!("lookup cache poisoned: {e}"))?
        .as_ref()
    {
        return Ok(Some(Arc::clone(cached)));
    }

    let Some(loaded) = load::<T>(path)? else {
        return Ok(None);
    };
    let loaded = Arc::new(loaded);
    *slot
        .write()
        .map_err(|e| anyhow!("lookup cache poisoned: {e}"))? = Some(Arc::clone(&loaded));
    Ok(Some(loaded))
}

/// Anchors that equal a query token, equal a 2- or 3-word window, or occur as a
/// substring of the lowercased query.
fn detect_lexical(index: &ConceptIndex, lowered: &str) -> BTreeSet<String> {
    let tokens: HashSet<&str> = TOKEN.find_iter(lowered).map(|m| m.as_str()).collect();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let mut phrases: HashSet<String> = HashSet::new();
    for n in [2, 3] {
        for window in words.windows(n) {
            phrases.insert(window.join(" "));
        }
    }

    index
        .anchors()
        .filter(|a| {
            tokens.contains(a.as_str()) || phrases.contains(a.as_str()) || lowered.contains(a.as_str())
        })
        .cloned()
        .collect()
}

fn round4(x: f32) -> f32 {
    (x * 10_000.0).round() / 10_000.0
}

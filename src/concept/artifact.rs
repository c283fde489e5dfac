//! The three persisted artifacts of a build: index, anchor embeddings, metadata.
//!
//! All are JSON. Writes go to a `.tmp` sibling that is synced and renamed over
//! the target, so a reader sees either the old file or the new one.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use super::ranked::RankedList;

/// Anchor text → ranked entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptIndex(pub BTreeMap<String, RankedList>);

impl ConceptIndex {
    pub fn get(&self, anchor: &str) -> Option<&RankedList> {
        self.0.get(anchor)
    }

    pub fn contains(&self, anchor: &str) -> bool {
        self.0.contains_key(anchor)
    }

    pub fn anchors(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.0.values().map(RankedList::len).sum()
    }
}

/// Anchor vectors in vocabulary order, one row per anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorEmbeddings {
    pub anchors: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl AnchorEmbeddings {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.anchors
            .iter()
            .map(String::as_str)
            .zip(self.embeddings.iter().map(Vec::as_slice))
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMeta {
    pub built_at: String,
    /// Anchors that ended up with at least one entry.
    pub n_anchors: usize,
    pub n_chunks: usize,
    pub n_files: usize,
    pub multi_word_anchors: usize,
    pub build_time_s: f64,
}

/// Serialize `value` as JSON and atomically replace `path`.
pub fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_vec(value)?;

    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Read a JSON artifact. A missing file is `Ok(None)`.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("corrupt artifact at {}", path.display()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::ranked::IndexEntry;

    #[test]
    fn save_then_load_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory/index.json");

        let mut index = ConceptIndex::default();
        index.0.insert(
            "garden".into(),
            RankedList::from_ranked(vec![IndexEntry {
                path: "memory/a.md".into(),
                line: 3,
                score: 0.5,
                source: "memory".into(),
                preview: "beds".into(),
            }]),
        );
        save_atomic(&path, &index).unwrap();

        let loaded: ConceptIndex = load(&path).unwrap().unwrap();
        assert_eq!(loaded, index);
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(loaded.total_entries(), 1);
    }

    #[test]
    fn missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<BuildMeta> = load(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load::<ConceptIndex>(&path).is_err());
    }
}

//! Per-anchor entry lists kept sorted by score.

use serde::{Deserialize, Serialize};

/// One anchor→chunk reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub line: usize,
    /// Anchor↔chunk cosine similarity, 4 decimals.
    pub score: f32,
    pub source: String,
    pub preview: String,
}

/// Entries for one anchor, best score first, at most one per `(path, line)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList(Vec<IndexEntry>);

impl RankedList {
    /// Build from entries already in descending score order.
    pub fn from_ranked(entries: Vec<IndexEntry>) -> Self {
        Self(entries)
    }

    /// Insert `entry`, or replace the entry at the same `(path, line)` when the new
    /// score is higher, then trim to `cap`. Returns whether the list changed.
    pub fn upsert(&mut self, entry: IndexEntry, cap: usize) -> bool {
        if let Some(pos) = self
            .0
            .iter()
            .position(|e| e.path == entry.path && e.line == entry.line)
        {
            if entry.score <= self.0[pos].score {
                return false;
            }
            self.0.remove(pos);
        }

        let at = self
            .0
            .iter()
            .position(|e| entry.score > e.score)
            .unwrap_or(self.0.len());
        if at >= cap {
            return false;
        }
        self.0.insert(at, entry);
        self.0.truncate(cap);
        true
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, line: usize, score: f32) -> IndexEntry {
        IndexEntry {
            path: path.into(),
            line,
            score,
            source: "memory".into(),
            preview: String::new(),
        }
    }

    fn scores(list: &RankedList) -> Vec<f32> {
        list.entries().iter().map(|e| e.score).collect()
    }

    #[test]
    fn inserts_in_score_order_and_caps() {
        let mut list = RankedList::default();
        assert!(list.upsert(entry("a", 1, 0.4), 3));
        assert!(list.upsert(entry("b", 1, 0.9), 3));
        assert!(list.upsert(entry("c", 1, 0.6), 3));
        assert!(list.upsert(entry("d", 1, 0.5), 3));
        assert_eq!(scores(&list), vec![0.9, 0.6, 0.5]);
        assert!(!list.upsert(entry("e", 1, 0.1), 3));
    }

    #[test]
    fn same_path_and_line_only_improves() {
        let mut list = RankedList::default();
        list.upsert(entry("a", 1, 0.5), 10);
        list.upsert(entry("b", 1, 0.7), 10);

        assert!(!list.upsert(entry("a", 1, 0.3), 10));
        assert!(list.upsert(entry("a", 1, 0.8), 10));
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].path, "a");
        assert_eq!(scores(&list), vec![0.8, 0.7]);

        // Different line in the same file is a separate entry
        assert!(list.upsert(entry("a", 9, 0.6), 10));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn serializes_as_plain_array() {
        let list = RankedList::from_ranked(vec![entry("a", 2, 0.5)]);
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["line"], 2);
    }
}

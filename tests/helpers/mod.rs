#![allow(dead_code)]

use anyhow::Result;
use hippocampus::db;
use hippocampus::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use hippocampus::memory::store::store_memory;
use hippocampus::memory::types::{MemoryType, NewMemory};
use rusqlite::{params, Connection};
use std::path::Path;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Bag-of-words embedder: every lowercase alphanumeric token is hashed (FNV-1a)
/// into one dimension, then the vector is L2-normalized. Texts that share words
/// get positive cosine similarity; texts that share none are (almost) orthogonal.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            v[(fnv1a(token) % self.dim as u64) as usize] += 1.0;
        }
        Ok(normalize(v))
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Deterministic 384-dim embedding with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// A unit vector close to `base`: a little weight on a second dimension.
pub fn similar_embedding(base: &[f32], nudge: usize) -> Vec<f32> {
    let mut v = base.to_vec();
    let i = nudge % v.len();
    v[i] += 0.1;
    normalize(v)
}

/// Store a memory with an explicit embedding. Returns the memory id.
pub fn insert_memory(
    conn: &mut Connection,
    content: &str,
    memory_type: MemoryType,
    importance: f64,
    embedding: &[f32],
) -> String {
    let new = NewMemory::new(content, memory_type, "test", importance).unwrap();
    store_memory(conn, &new, embedding).unwrap().id
}

/// Move a memory's timestamps `days_ago` days into the past.
pub fn backdate(conn: &Connection, id: &str, days_ago: f64) {
    let then = chrono::Utc::now() - chrono::Duration::seconds((days_ago * 86_400.0) as i64);
    conn.execute(
        "UPDATE memories SET created_at = ?1, last_accessed = NULL WHERE id = ?2",
        params![then.to_rfc3339(), id],
    )
    .unwrap();
}

pub fn strength_of(conn: &Connection, id: &str) -> f64 {
    conn.query_row("SELECT strength FROM memories WHERE id = ?1", [id], |row| row.get(0))
        .unwrap()
}

pub fn is_deleted(conn: &Connection, id: &str) -> bool {
    conn.query_row("SELECT is_deleted FROM memories WHERE id = ?1", [id], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap()
        != 0
}

/// Write `content` to `workspace/rel`, creating parent directories.
pub fn write_file(workspace: &Path, rel: &str, content: &str) {
    let path = workspace.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

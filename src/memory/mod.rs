//! Cognitive memory store: store/recall, forget, decay and consolidation,
//! the association graph, the summary hierarchy, spreading activation, and sharing.

pub mod activation;
pub mod associations;
pub mod cluster;
pub mod forget;
pub mod hierarchy;
pub mod maintenance;
pub mod search;
pub mod sharing;
pub mod stats;
pub mod store;
pub mod types;

use rusqlite::OptionalExtension;

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Inverse of [`embedding_to_bytes`] for blobs read back from `memories_vec`.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cut `content` to `max_chars` characters, appending "..." when anything was dropped.
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}

pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Load stored embeddings for `ids`. Ids without a vector are absent from the map.
pub(crate) fn load_embeddings(
    conn: &rusqlite::Connection,
    ids: &[String],
) -> anyhow::Result<std::collections::HashMap<String, Vec<f32>>> {
    let mut out = std::collections::HashMap::with_capacity(ids.len());
    let mut stmt = conn.prepare("SELECT embedding FROM memories_vec WHERE id = ?1")?;
    for id in ids {
        let blob: Option<Vec<u8>> = stmt.query_row([id], |row| row.get(0)).optional()?;
        if let Some(blob) = blob {
            out.insert(id.clone(), bytes_to_embedding(&blob));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(embedding_to_bytes(&v)), v);
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn round4_rounds() {
        assert_eq!(round4(0.123456), 0.1235);
    }
}

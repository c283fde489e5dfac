//! Memory store commands: store, recall, forget, hard-delete, stats.

use anyhow::Result;

use hippocampus::config::HippocampusConfig;
use hippocampus::memory::{forget, search, stats, store};
use hippocampus::memory::types::{MemoryType, NewMemory, RecallStrategy};

use super::{header, one_line, open_db, open_embedder, print_json};

pub fn store(
    config: &HippocampusConfig,
    content: &str,
    memory_type: MemoryType,
    source: &str,
    importance: f64,
    metadata: Option<serde_json::Value>,
) -> Result<()> {
    let mut new = NewMemory::new(content, memory_type, source, importance)?;
    if let Some(metadata) = metadata {
        new = new.with_metadata(metadata);
    }

    let mut conn = open_db(config)?;
    let embedder = open_embedder(config)?;
    let result = store::remember(&mut conn, &embedder, &new)?;
    println!("Stored {} memory {}", result.memory_type, result.id);
    Ok(())
}

pub fn recall(
    config: &HippocampusConfig,
    query: &str,
    strategy: RecallStrategy,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let embedder = open_embedder(config)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);

    let results = search::recall(
        &conn,
        &embedder,
        query,
        strategy,
        limit,
        config.retrieval.vec_weight,
    )?;

    if json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, r) in results.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score: {:.4}, strength: {:.2})",
            i + 1,
            r.memory.memory_type,
            r.memory.id,
            r.score,
            r.memory.strength,
        );
        println!("     {}", one_line(&r.memory.content, 120));
        println!();
    }
    Ok(())
}

/// Soft-delete by id, or everything a query matches.
pub fn forget(config: &HippocampusConfig, id: Option<&str>, query: Option<&str>) -> Result<()> {
    let mut conn = open_db(config)?;
    match (id, query) {
        (Some(id), _) => {
            forget::forget(&mut conn, id)?;
            println!("Forgot {id}");
        }
        (None, Some(query)) => {
            let embedder = open_embedder(config)?;
            let forgotten = forget::forget_matching(
                &mut conn,
                &embedder,
                query,
                config.retrieval.forget_query_limit,
                config.retrieval.vec_weight,
            )?;
            println!("Forgot {} memories", forgotten.len());
            for f in &forgotten {
                println!("  {}", f.id);
            }
        }
        (None, None) => anyhow::bail!("pass either --id or --query"),
    }
    Ok(())
}

pub fn hard_delete(config: &HippocampusConfig, id: &str) -> Result<()> {
    let mut conn = open_db(config)?;
    if forget::hard_delete(&mut conn, id)? {
        println!("Permanently deleted {id}");
    } else {
        println!("No memory with id {id}");
    }
    Ok(())
}

pub fn stats(config: &HippocampusConfig, json: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = open_db(config)?;
    let s = stats::memory_stats(&conn, Some(&db_path))?;
    if json {
        return print_json(&s);
    }

    header("Memory Statistics");
    println!("Active:           {}", s.total_active);
    println!("Deleted:          {}", s.total_deleted);
    println!("With embeddings:  {}", s.with_embeddings);
    println!("Database size:    {} bytes", s.db_size_bytes);
    println!();
    println!("By type:");
    for (memory_type, count) in &s.by_type {
        println!("  {memory_type:<12} {count}");
    }
    Ok(())
}

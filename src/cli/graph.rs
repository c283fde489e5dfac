//! Association graph and graph-aware recall commands.

use anyhow::Result;

use hippocampus::config::HippocampusConfig;
use hippocampus::memory::activation::{primed_recall, Via};
use hippocampus::memory::associations::{
    associate, association_stats, get_associations, recall_associated,
};
use hippocampus::memory::hierarchy::recall_adaptive;
use hippocampus::memory::types::{DetailLevel, EdgeType};

use super::{header, one_line, open_db, open_embedder, print_json};

pub fn link(
    config: &HippocampusConfig,
    source: &str,
    target: &str,
    edge_type: EdgeType,
    weight: f64,
) -> Result<()> {
    let conn = open_db(config)?;
    let result = associate(&conn, source, target, edge_type, weight, None)?;
    if result.created {
        println!("Linked {source} -> {target} ({edge_type}, {:.2})", result.weight);
    } else {
        println!(
            "Edge already existed; weight is now {:.2} (edge {})",
            result.weight, result.id
        );
    }
    Ok(())
}

/// Edges of one memory, or graph-wide statistics when no id is given.
pub fn links(config: &HippocampusConfig, id: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db(config)?;

    let Some(id) = id else {
        let stats = association_stats(&conn)?;
        if json {
            return print_json(&stats);
        }
        header("Association Graph");
        println!("Edges:              {}", stats.total_edges);
        println!("Connected memories: {}", stats.connected_memories);
        println!("Average weight:     {:.3}", stats.avg_weight);
        for (edge_type, count) in &stats.by_type {
            println!("  {edge_type:<10} {count}");
        }
        return Ok(());
    };

    let edges = get_associations(&conn, id)?;
    if json {
        return print_json(&edges);
    }
    if edges.is_empty() {
        println!("No associations for {id}");
        return Ok(());
    }
    for e in &edges {
        let (arrow, other) = if e.source_id == id {
            ("->", &e.target_id)
        } else {
            ("<-", &e.source_id)
        };
        println!("  {arrow} {other} [{}] {:.3}", e.edge_type, e.weight);
    }
    Ok(())
}

pub fn recall_assoc(
    config: &HippocampusConfig,
    query: &str,
    hops: u32,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let embedder = open_embedder(config)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let results = recall_associated(
        &conn,
        &embedder,
        query,
        hops,
        limit,
        config.retrieval.vec_weight,
    )?;
    if json {
        return print_json(&results);
    }

    for r in &results {
        let via = r.via.map_or("direct".to_string(), |v| v.to_string());
        println!(
            "  hop {} [{via}] {:.4} {}",
            r.hop,
            r.score,
            one_line(&r.memory.content, 100)
        );
    }
    if results.is_empty() {
        println!("No results found.");
    }
    Ok(())
}

pub fn recall_at_level(
    config: &HippocampusConfig,
    query: &str,
    detail: DetailLevel,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let embedder = open_embedder(config)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let out = recall_adaptive(
        &conn,
        &embedder,
        query,
        detail,
        limit,
        config.retrieval.vec_weight,
    )?;
    if json {
        return print_json(&out);
    }

    println!(
        "Level {} ({}){}\n",
        out.level,
        out.label,
        if out.fell_back { ", empty level, used hybrid recall" } else { "" }
    );
    for (i, r) in out.results.iter().enumerate() {
        println!(
            "  {}. {:.4} {}",
            i + 1,
            r.score,
            one_line(&r.memory.content, 120)
        );
    }
    Ok(())
}

pub fn primed(
    config: &HippocampusConfig,
    query: &str,
    context: &[String],
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let embedder = open_embedder(config)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let results = primed_recall(
        &conn,
        &embedder,
        query,
        context,
        limit,
        config.retrieval.vec_weight,
        &config.activation,
    )?;
    if json {
        return print_json(&results);
    }

    for (i, r) in results.iter().enumerate() {
        let tag = match r.via {
            Via::Direct => "direct",
            Via::Activation => "primed",
        };
        println!(
            "  {}. [{tag}] {:.4} (activation {:.3}) {}",
            i + 1,
            r.final_score,
            r.activation,
            one_line(&r.memory.content, 100)
        );
    }
    if results.is_empty() {
        println!("No results found.");
    }
    Ok(())
}

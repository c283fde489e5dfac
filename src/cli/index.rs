//! `hippocampus index ...`: build, query, update and inspect the concept index.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use hippocampus::concept::builder::build_index;
use hippocampus::concept::incremental::{incremental_update, incremental_update_file};
use hippocampus::concept::index_status;
use hippocampus::concept::lookup::LookupEngine;
use hippocampus::config::HippocampusConfig;

use super::{header, open_embedder, print_json};

/// Full rebuild with a spinner showing the current stage.
pub fn build(config: &HippocampusConfig) -> Result<()> {
    let workspace = config.resolved_workspace();
    let embedder = open_embedder(config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg} [{elapsed}]")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let out = build_index(&workspace, config, &embedder, &|stage| {
        pb.set_message(stage.to_string())
    });
    pb.finish_and_clear();
    let out = out?;

    let meta = &out.meta;
    println!("Built concept index for {}", workspace.display());
    println!("  Files:        {}", meta.n_files);
    println!("  Chunks:       {}", meta.n_chunks);
    println!(
        "  Anchors:      {} ({} multi-word)",
        meta.n_anchors, meta.multi_word_anchors
    );
    println!("  Entries:      {}", out.index.total_entries());
    println!("  Build time:   {:.2}s", meta.build_time_s);
    Ok(())
}

pub struct LookupArgs<'a> {
    pub query: &'a str,
    pub max: Option<usize>,
    pub json: bool,
    pub lexical_only: bool,
    pub anchors: &'a [String],
}

pub fn lookup(config: &HippocampusConfig, args: LookupArgs<'_>) -> Result<()> {
    let workspace = config.resolved_workspace();
    let embedder = open_embedder(config)?;

    let mut lookup_cfg = config.lookup.clone();
    if let Some(max) = args.max {
        lookup_cfg.max_chunks = max;
    }
    let engine = LookupEngine::new(&workspace, &config.index, lookup_cfg);
    let hits = engine.lookup(&embedder, args.query, args.anchors, !args.lexical_only)?;

    if args.json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("No matching anchors.");
        return Ok(());
    }

    println!(
        "{} result(s) in {:.1}ms\n",
        hits.len(),
        hits.first().map_or(0.0, |h| h.lookup_ms)
    );
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {}. {}:{} [{}] (anchor: {}, score: {:.4})",
            i + 1,
            hit.entry.path,
            hit.entry.line,
            hit.entry.source,
            hit.matched_anchor,
            hit.final_score,
        );
        println!("     {}", hit.entry.preview);
    }
    Ok(())
}

/// Fold one new item into the index, either from a file or inline content.
pub fn update(
    config: &HippocampusConfig,
    file: Option<&Path>,
    path: Option<&str>,
    content: Option<&str>,
) -> Result<()> {
    let workspace = config.resolved_workspace();
    let embedder = open_embedder(config)?;

    let result = match (file, path, content) {
        (Some(file), _, _) => incremental_update_file(&workspace, config, &embedder, file, None)?,
        (None, Some(path), Some(content)) => {
            incremental_update(&workspace, config, &embedder, content, path, None)?
        }
        _ => anyhow::bail!("pass either --file, or both --path and --content"),
    };

    println!(
        "Added {} chunk(s), updated {} anchor(s) in {:.1}ms",
        result.chunks_added, result.anchors_updated, result.elapsed_ms
    );
    Ok(())
}

pub fn status(config: &HippocampusConfig, json: bool) -> Result<()> {
    let workspace = config.resolved_workspace();
    let status = index_status(&workspace, &config.index)?;
    if json {
        return print_json(&status);
    }

    header("Concept Index Status");
    println!("Workspace:        {}", workspace.display());
    println!(
        "Index file:       {}",
        if status.index_exists { "present" } else { "missing" }
    );
    println!(
        "Anchor vectors:   {}",
        if status.embeds_exists { "present" } else { "missing" }
    );
    println!("Anchors:          {}", status.anchors);
    println!("Entries:          {}", status.total_entries);
    println!("Avg per anchor:   {}", status.avg_entries_per_anchor);
    if let Some(meta) = &status.meta {
        println!("Last build:       {}", meta.built_at);
        println!("  Files:          {}", meta.n_files);
        println!("  Chunks:         {}", meta.n_chunks);
        println!("  Build time:     {:.2}s", meta.build_time_s);
    }

    print_server_status(config);
    Ok(())
}

#[cfg(unix)]
fn print_server_status(config: &HippocampusConfig) {
    use hippocampus::embedding::socket::SocketEmbeddingProvider;

    let provider = SocketEmbeddingProvider::new(&config.embedding);
    match provider.ping() {
        Ok(s) => println!(
            "Embedding server: {} (model: {}, uptime: {:.0}s)",
            s.status,
            s.model.as_deref().unwrap_or("unknown"),
            s.uptime.unwrap_or(0.0)
        ),
        Err(e) => println!("Embedding server: unreachable ({e})"),
    }
}

#[cfg(not(unix))]
fn print_server_status(_config: &HippocampusConfig) {}

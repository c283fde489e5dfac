//! Lifecycle commands: decay and consolidation, temporal linking, hierarchy building.

use anyhow::Result;

use hippocampus::config::HippocampusConfig;
use hippocampus::memory::associations::build_temporal_associations;
use hippocampus::memory::hierarchy::{build_hierarchy, hierarchy_stats};
use hippocampus::memory::maintenance;
use hippocampus::memory::types::level_label;

use super::{header, open_db, open_embedder, print_json};

/// Decay everything, then (unless `decay_only`) cluster and summarize recent memories.
pub fn consolidate(config: &HippocampusConfig, days: Option<f64>, decay_only: bool) -> Result<()> {
    let mut conn = open_db(config)?;

    if decay_only {
        println!("Applying strength decay...");
        let decay = maintenance::apply_decay(&mut conn, &config.maintenance)?;
        print_decay(&decay);
        return Ok(());
    }

    let embedder = open_embedder(config)?;
    let days = days.unwrap_or(config.maintenance.consolidate_days);
    println!("Consolidating memories from the last {days} day(s)...");
    let result = maintenance::consolidate(&mut conn, &embedder, &config.maintenance, days)?;

    print_decay(&result.decay);
    if result.summaries_created > 0 {
        println!(
            "  Found {} cluster(s), created {} summaries and {} associations.",
            result.clusters_found, result.summaries_created, result.associations_created
        );
    } else {
        println!("  No clusters to consolidate.");
    }
    println!("Done in {}ms.", result.elapsed_ms);
    Ok(())
}

fn print_decay(decay: &maintenance::DecayResult) {
    println!(
        "  Decayed {}, forgot {} below the floor, {} unchanged.",
        decay.decayed, decay.deleted, decay.unchanged
    );
}

pub fn temporal_links(config: &HippocampusConfig, window_minutes: Option<f64>) -> Result<()> {
    let conn = open_db(config)?;
    let window = window_minutes.unwrap_or(config.maintenance.temporal_window_minutes);
    let created = build_temporal_associations(&conn, window)?;
    println!("Linked {created} memory pair(s) within {window} minutes of each other.");
    Ok(())
}

pub fn rebuild_hierarchy(config: &HippocampusConfig) -> Result<()> {
    let mut conn = open_db(config)?;
    println!("Building memory hierarchy...");
    let result = build_hierarchy(&mut conn, &config.hierarchy)?;
    println!("  {} node(s) in {}ms", result.total_nodes, result.elapsed_ms);
    for (level, count) in &result.by_level {
        println!("    level {level} ({}): {count}", level_label(*level));
    }
    Ok(())
}

pub fn show_hierarchy_stats(config: &HippocampusConfig, json: bool) -> Result<()> {
    let conn = open_db(config)?;
    let stats = hierarchy_stats(&conn)?;
    if json {
        return print_json(&stats);
    }

    header("Memory Hierarchy");
    println!("Nodes:            {}", stats.total_nodes);
    println!("Root summaries:   {}", stats.root_summaries);
    for (level, count) in &stats.by_level {
        println!("  {level} {:<8} {count}", level_label(*level));
    }
    Ok(())
}

//! CLI subcommand implementations.
//!
//! Each command opens what it needs (database, workspace, embedding client) from
//! the loaded config, calls into the library, and prints a human-readable report
//! to stdout. Logging stays on stderr.

pub mod graph;
pub mod index;
pub mod maintenance;
pub mod memory;
pub mod sharing;

use anyhow::Result;
use rusqlite::Connection;

use hippocampus::config::HippocampusConfig;
use hippocampus::embedding::{self, EmbeddingClient};
use hippocampus::memory::truncate;

pub(crate) fn open_db(config: &HippocampusConfig) -> Result<Connection> {
    hippocampus::db::open_database(config.resolved_db_path())
}

pub(crate) fn open_embedder(config: &HippocampusConfig) -> Result<EmbeddingClient> {
    embedding::create_provider(&config.embedding)
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line of content, cut for terminal output.
pub(crate) fn one_line(content: &str, max_chars: usize) -> String {
    truncate(&content.replace('\n', " "), max_chars)
}

pub(crate) fn header(title: &str) {
    println!("{title}");
    println!("{}", "=".repeat(40));
}

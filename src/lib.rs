//! Personal knowledge retrieval for autonomous agents.
//!
//! Hippocampus indexes an agent's unstructured memory text (notes, logs,
//! conversations) so relevant context can be pulled in at inference time without
//! scanning the whole corpus. It has two tiers that share one embedding client:
//!
//! | Tier | Storage | Query path |
//! |------|---------|------------|
//! | **Concept index** | JSON artifacts in the workspace | Anchor detection, candidate merge, re-rank |
//! | **Cognitive memory store** | SQLite + FTS5 + sqlite-vec | Hybrid recall, association graph, hierarchy, activation |
//!
//! # Architecture
//!
//! - **Embeddings**: an external model server over a Unix socket (384 dimensions),
//!   wrapped in a per-client text→vector cache
//! - **Concept index**: anchors (bold terms, headings, acronyms, frequent words,
//!   entity names) scored against markdown chunks, rebuilt nightly and updated per
//!   stored item
//! - **Memory store**: typed memories with strength decay, consolidation into
//!   summaries, a typed association graph, a multi-level summary hierarchy,
//!   spreading activation and consent-gated sharing
//! - **Transport**: CLI, plus MCP over stdio for agent integration
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema and migrations
//! - [`embedding`] — Embedding provider trait, socket client and caching wrapper
//! - [`concept`] — Chunker, anchor extractor, index builder, incremental updater, lookup
//! - [`memory`] — Cognitive memory store: recall, forget, decay, graph, hierarchy, sharing

pub mod concept;
pub mod config;
pub mod db;
pub mod embedding;
pub mod memory;

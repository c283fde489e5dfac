mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hippocampus::config::HippocampusConfig;
use hippocampus::memory::sharing::ShareDirection;
use hippocampus::memory::types::{DetailLevel, EdgeType, MemoryType, RecallStrategy};

#[derive(Parser)]
#[command(
    name = "hippocampus",
    version,
    about = "Concept index and cognitive memory store for autonomous agents"
)]
struct Cli {
    /// Config file (default: ~/.hippocampus/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Build, query and inspect the concept index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Store a new memory
    Store {
        content: String,
        #[arg(long = "type", default_value = "semantic")]
        memory_type: MemoryType,
        #[arg(long, default_value = "user")]
        source: String,
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
        /// JSON object attached to the memory
        #[arg(long, value_parser = parse_json)]
        metadata: Option<serde_json::Value>,
    },
    /// Search memories
    Recall {
        query: String,
        #[arg(long, default_value = "hybrid")]
        strategy: RecallStrategy,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a memory by id, or every memory a query matches
    Forget {
        #[arg(long, conflicts_with = "query")]
        id: Option<String>,
        #[arg(long)]
        query: Option<String>,
    },
    /// Permanently remove a memory and everything attached to it
    HardDelete { id: String },
    /// Show memory store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Link two memories
    Associate {
        source: String,
        target: String,
        #[arg(long = "type", default_value = "explicit")]
        edge_type: EdgeType,
        #[arg(long, default_value_t = 0.7)]
        weight: f64,
    },
    /// Show a memory's edges, or graph statistics without an id
    Links {
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Recall, then follow association edges
    RecallAssoc {
        query: String,
        #[arg(long, default_value_t = 1)]
        hops: u32,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Link memories created close together in time
    TemporalLinks {
        #[arg(long)]
        window_minutes: Option<f64>,
    },
    /// Decay strengths and summarize clusters of recent memories
    Consolidate {
        #[arg(long)]
        days: Option<f64>,
        #[arg(long)]
        decay_only: bool,
    },
    /// Rebuild the multi-level summary hierarchy
    BuildHierarchy,
    /// Recall at a hierarchy level (auto, broad, specific, or 0-3)
    RecallAdaptive {
        query: String,
        #[arg(long, default_value = "auto")]
        detail: DetailLevel,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show hierarchy node counts
    HierarchyStats {
        #[arg(long)]
        json: bool,
    },
    /// Recall boosted by spreading activation from recent context
    PrimedRecall {
        query: String,
        /// Recent conversation items, oldest first
        #[arg(long, num_args = 1..)]
        context: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Offer a memory to another agent
    Share {
        memory_id: String,
        #[arg(long)]
        with: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Record the recipient's consent to a share
    Approve { share_id: String },
    /// Revoke one share, or every share of a memory
    Revoke {
        #[arg(long, conflicts_with = "memory")]
        share: Option<String>,
        #[arg(long)]
        memory: Option<String>,
    },
    /// List active shares
    Shared {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long, default_value = "both")]
        direction: ShareDirection,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from the workspace sources
    Build,
    /// Find chunks relevant to a query
    Lookup {
        query: String,
        #[arg(long)]
        max: Option<usize>,
        #[arg(long)]
        json: bool,
        /// Skip embedding-based anchor expansion
        #[arg(long)]
        lexical_only: bool,
        /// Extra anchors to include when the index knows them
        #[arg(long = "anchor")]
        anchors: Vec<String>,
    },
    /// Fold one new item into the index
    Update {
        #[arg(long, conflicts_with_all = ["path", "content"])]
        file: Option<PathBuf>,
        #[arg(long, requires = "content")]
        path: Option<String>,
        #[arg(long, requires = "path")]
        content: Option<String>,
    },
    /// Show index artifacts and embedding server health
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HippocampusConfig::load_from(path)?,
        None => HippocampusConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC and --json output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await,
        command => tokio::task::spawn_blocking(move || run(command, &config)).await?,
    }
}

/// Everything except `serve` talks to SQLite and the embedding socket synchronously.
fn run(command: Command, config: &HippocampusConfig) -> Result<()> {
    match command {
        Command::Serve => unreachable!("serve runs on the async runtime"),
        Command::Index { action } => match action {
            IndexAction::Build => cli::index::build(config),
            IndexAction::Lookup {
                query,
                max,
                json,
                lexical_only,
                anchors,
            } => cli::index::lookup(
                config,
                cli::index::LookupArgs {
                    query: &query,
                    max,
                    json,
                    lexical_only,
                    anchors: &anchors,
                },
            ),
            IndexAction::Update {
                file,
                path,
                content,
            } => cli::index::update(config, file.as_deref(), path.as_deref(), content.as_deref()),
            IndexAction::Status { json } => cli::index::status(config, json),
        },
        Command::Store {
            content,
            memory_type,
            source,
            importance,
            metadata,
        } => cli::memory::store(config, &content, memory_type, &source, importance, metadata),
        Command::Recall {
            query,
            strategy,
            limit,
            json,
        } => cli::memory::recall(config, &query, strategy, limit, json),
        Command::Forget { id, query } => {
            cli::memory::forget(config, id.as_deref(), query.as_deref())
        }
        Command::HardDelete { id } => cli::memory::hard_delete(config, &id),
        Command::Stats { json } => cli::memory::stats(config, json),
        Command::Associate {
            source,
            target,
            edge_type,
            weight,
        } => cli::graph::link(config, &source, &target, edge_type, weight),
        Command::Links { id, json } => cli::graph::links(config, id.as_deref(), json),
        Command::RecallAssoc {
            query,
            hops,
            limit,
            json,
        } => cli::graph::recall_assoc(config, &query, hops, limit, json),
        Command::TemporalLinks { window_minutes } => {
            cli::maintenance::temporal_links(config, window_minutes)
        }
        Command::Consolidate { days, decay_only } => {
            cli::maintenance::consolidate(config, days, decay_only)
        }
        Command::BuildHierarchy => cli::maintenance::rebuild_hierarchy(config),
        Command::RecallAdaptive {
            query,
            detail,
            limit,
            json,
        } => cli::graph::recall_at_level(config, &query, detail, limit, json),
        Command::HierarchyStats { json } => cli::maintenance::show_hierarchy_stats(config, json),
        Command::PrimedRecall {
            query,
            context,
            limit,
            json,
        } => cli::graph::primed(config, &query, &context, limit, json),
        Command::Share {
            memory_id,
            with,
            threshold,
        } => cli::sharing::share(config, &memory_id, &with, threshold),
        Command::Approve { share_id } => cli::sharing::approve(config, &share_id),
        Command::Revoke { share, memory } => {
            cli::sharing::revoke(config, share.as_deref(), memory.as_deref())
        }
        Command::Shared {
            agent,
            direction,
            json,
        } => cli::sharing::shared(config, agent.as_deref(), direction, json),
    }
}

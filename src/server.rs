//! MCP server initialization over stdio.
//!
//! Wires the database, the embedding client and the concept lookup engine into
//! the tool handler and runs it until the client disconnects.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::tools::HippocampusTools;
use hippocampus::concept::lookup::LookupEngine;
use hippocampus::config::HippocampusConfig;
use hippocampus::db;
use hippocampus::embedding::{self, EmbeddingProvider};

pub struct SharedState {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub lookup: Arc<LookupEngine>,
    pub config: Arc<HippocampusConfig>,
}

/// Open the DB, create the embedding client and the lookup engine.
fn setup_shared_state(config: HippocampusConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    if let Ok(Some(stored)) = db::migrations::get_embedding_dim(&conn) {
        if stored != config.embedding.dimensions {
            tracing::warn!(
                stored,
                configured = config.embedding.dimensions,
                "embedding dimension differs from the one the store was created with"
            );
        }
    }

    let client = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(client);
    tracing::info!(socket = %config.embedding.socket_path, "embedding client ready");

    let workspace = config.resolved_workspace();
    let lookup = Arc::new(LookupEngine::new(
        &workspace,
        &config.index,
        config.lookup.clone(),
    ));

    Ok(SharedState {
        db: Arc::new(Mutex::new(conn)),
        embedding,
        lookup,
        config: Arc::new(config),
    })
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: HippocampusConfig) -> Result<()> {
    tracing::info!("starting Hippocampus MCP server on stdio");

    let state = setup_shared_state(config)?;
    let tools = HippocampusTools::new(state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

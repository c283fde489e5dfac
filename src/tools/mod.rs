pub mod concept_lookup;
pub mod concept_update;
pub mod forget_memory;
pub mod primed_recall;
pub mod recall_memory;
pub mod store_memory;

use concept_lookup::ConceptLookupParams;
use concept_update::ConceptUpdateParams;
use forget_memory::ForgetMemoryParams;
use primed_recall::PrimedRecallParams;
use recall_memory::RecallMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use store_memory::StoreMemoryParams;

use crate::server::SharedState;
use hippocampus::concept::incremental::incremental_update;
use hippocampus::concept::lookup::LookupEngine;
use hippocampus::config::HippocampusConfig;
use hippocampus::embedding::EmbeddingProvider;
use hippocampus::memory::types::{DetailLevel, MemoryType, NewMemory, RecallStrategy};
use hippocampus::memory::{activation, forget, hierarchy, search, store};

/// The Hippocampus MCP tool handler. Holds the shared database connection,
/// embedding client, lookup engine and config, and exposes the tools via
/// `#[tool_router]`.
#[derive(Clone)]
pub struct HippocampusTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    lookup: Arc<LookupEngine>,
    config: Arc<HippocampusConfig>,
}

/// Run sync library code off the async runtime, flattening both failure layers
/// into the tool's string error.
async fn blocking<T, F>(what: &str, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("{what} task failed: {e}"))?
        .map_err(|e| format!("{what} failed: {e}"))
}

fn lock(db: &Mutex<Connection>) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl HippocampusTools {
    pub fn new(state: SharedState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db: state.db,
            embedding: state.embedding,
            lookup: state.lookup,
            config: state.config,
        }
    }

    /// Look up background context in the concept index.
    #[tool(description = "Find workspace notes relevant to a message using the pre-built concept index. Returns ranked chunks with path, line, preview and score.")]
    async fn concept_lookup(
        &self,
        Parameters(params): Parameters<ConceptLookupParams>,
    ) -> Result<String, String> {
        tracing::info!(query_len = params.query.len(), "concept_lookup called");

        let lookup = Arc::clone(&self.lookup);
        let embedding = Arc::clone(&self.embedding);
        let hits = blocking("lookup", move || {
            lookup.lookup(
                embedding.as_ref(),
                &params.query,
                params.project_anchors.as_deref().unwrap_or_default(),
                params.semantic.unwrap_or(true),
            )
        })
        .await?;

        to_json(&hits)
    }

    /// Fold newly written content into the concept index.
    #[tool(description = "Add newly written markdown to the concept index so it is findable immediately. Only existing anchors gain entries; the vocabulary changes on full rebuilds.")]
    async fn concept_update(
        &self,
        Parameters(params): Parameters<ConceptUpdateParams>,
    ) -> Result<String, String> {
        tracing::info!(path = %params.path, "concept_update called");

        let config = Arc::clone(&self.config);
        let embedding = Arc::clone(&self.embedding);
        let lookup = Arc::clone(&self.lookup);
        let result = blocking("index update", move || {
            let workspace = config.resolved_workspace();
            incremental_update(
                &workspace,
                &config,
                embedding.as_ref(),
                &params.content,
                &params.path,
                Some(lookup.as_ref()),
            )
        })
        .await?;

        to_json(&result)
    }

    /// Store a new memory in the cognitive memory store.
    #[tool(description = "Store a new memory. Types: episodic (events/experiences), semantic (facts/knowledge), procedural (how-to/processes). Optionally also index it as workspace content.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        let memory_type = match params.r#type.as_deref() {
            Some(t) => t.parse::<MemoryType>()?,
            None => MemoryType::Semantic,
        };
        let mut new = NewMemory::new(
            params.content,
            memory_type,
            params.source.unwrap_or_else(|| "agent".into()),
            params.importance.unwrap_or(0.5),
        )
        .map_err(|e| e.to_string())?;
        if let Some(metadata) = params.metadata {
            new = new.with_metadata(metadata);
        }

        tracing::info!(
            content_len = new.content.len(),
            memory_type = %memory_type,
            "store_memory called"
        );

        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let config = Arc::clone(&self.config);
        let lookup = Arc::clone(&self.lookup);
        let index_path = params.index_path;
        let (stored, indexed) = blocking("store", move || {
            let stored = {
                let mut conn = lock(&db)?;
                store::remember(&mut conn, embedding.as_ref(), &new)?
            };
            let indexed = match index_path {
                Some(path) => Some(incremental_update(
                    &config.resolved_workspace(),
                    &config,
                    embedding.as_ref(),
                    &new.content,
                    &path,
                    Some(lookup.as_ref()),
                )?),
                None => None,
            };
            Ok((stored, indexed))
        })
        .await?;

        tracing::info!(id = %stored.id, "memory stored");
        Ok(serde_json::json!({ "memory": stored, "index": indexed }).to_string())
    }

    /// Search the memory store.
    #[tool(description = "Search memories by natural language query. Hybrid (vector + keyword) by default; pass 'detail' to search a level of the summary hierarchy instead.")]
    async fn recall_memory(
        &self,
        Parameters(params): Parameters<RecallMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(query_len = params.query.len(), "recall_memory called");

        let strategy = match params.strategy.as_deref() {
            Some(s) => s.parse::<RecallStrategy>()?,
            None => RecallStrategy::Hybrid,
        };
        let detail = params
            .detail
            .as_deref()
            .map(str::parse::<DetailLevel>)
            .transpose()?;
        let limit = params.limit.unwrap_or(self.config.retrieval.default_limit);
        let vec_weight = self.config.retrieval.vec_weight;

        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let query = params.query;
        match detail {
            Some(detail) => {
                let out = blocking("recall", move || {
                    let conn = lock(&db)?;
                    hierarchy::recall_adaptive(
                        &conn,
                        embedding.as_ref(),
                        &query,
                        detail,
                        limit,
                        vec_weight,
                    )
                })
                .await?;
                to_json(&out)
            }
            None => {
                let results = blocking("recall", move || {
                    let conn = lock(&db)?;
                    search::recall(&conn, embedding.as_ref(), &query, strategy, limit, vec_weight)
                })
                .await?;
                to_json(&results)
            }
        }
    }

    /// Forget memories by id or by query.
    #[tool(description = "Forget a memory by ID (soft delete, or permanent with hard_delete=true), or soft-delete the memories a query recalls.")]
    async fn forget_memory(
        &self,
        Parameters(params): Parameters<ForgetMemoryParams>,
    ) -> Result<String, String> {
        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let retrieval = self.config.retrieval.clone();

        match (params.memory_id, params.query) {
            (Some(id), _) => {
                tracing::info!(id = %id, "forget_memory called");
                let hard = params.hard_delete.unwrap_or(false);
                blocking("forget", move || {
                    let mut conn = lock(&db)?;
                    if hard {
                        let removed = forget::hard_delete(&mut conn, &id)?;
                        Ok(serde_json::json!({ "id": id, "hard_deleted": removed }))
                    } else {
                        Ok(serde_json::to_value(forget::forget(&mut conn, &id)?)?)
                    }
                })
                .await
                .map(|v| v.to_string())
            }
            (None, Some(query)) => {
                tracing::info!(query_len = query.len(), "forget_memory called with query");
                let forgotten = blocking("forget", move || {
                    let mut conn = lock(&db)?;
                    forget::forget_matching(
                        &mut conn,
                        embedding.as_ref(),
                        &query,
                        retrieval.forget_query_limit,
                        retrieval.vec_weight,
                    )
                })
                .await?;
                to_json(&forgotten)
            }
            (None, None) => Err("either memory_id or query is required".into()),
        }
    }

    /// Recall primed by spreading activation from recent context.
    #[tool(description = "Search memories, boosting those connected in the association graph to the query hits and to recent conversation context. Can surface related memories the query alone misses.")]
    async fn primed_recall(
        &self,
        Parameters(params): Parameters<PrimedRecallParams>,
    ) -> Result<String, String> {
        tracing::info!(query_len = params.query.len(), "primed_recall called");

        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let config = Arc::clone(&self.config);
        let limit = params.limit.unwrap_or(config.retrieval.default_limit);
        let results = blocking("primed recall", move || {
            let conn = lock(&db)?;
            activation::primed_recall(
                &conn,
                embedding.as_ref(),
                &params.query,
                params.context.as_deref().unwrap_or_default(),
                limit,
                config.retrieval.vec_weight,
                &config.activation,
            )
        })
        .await?;

        to_json(&results)
    }
}

#[tool_handler]
impl ServerHandler for HippocampusTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Hippocampus gives an agent long-term memory. Use concept_lookup for background \
                 from workspace notes, store_memory and recall_memory for the memory store, \
                 and primed_recall when recent conversation context should steer recall."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

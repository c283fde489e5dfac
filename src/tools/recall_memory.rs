//! MCP `recall_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallMemoryParams {
    #[schemars(description = "Natural language query to search memories")]
    pub query: String,

    #[schemars(description = "Ranking: 'keyword', 'vector' or 'hybrid' (default)")]
    pub strategy: Option<String>,

    /// Hierarchy detail: `auto`, `broad`, `specific` or a level number.
    #[schemars(
        description = "Search one hierarchy level instead: 'auto', 'broad', 'specific' or 0-3. Overrides strategy."
    )]
    pub detail: Option<String>,

    #[schemars(description = "Maximum number of results. Defaults to 10.")]
    pub limit: Option<usize>,
}

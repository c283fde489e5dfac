use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "The natural language content of the memory")]
    pub content: String,

    #[schemars(
        description = "Memory type: 'episodic' (events/experiences), 'semantic' (facts/knowledge, default), 'procedural' (how-to/processes)"
    )]
    pub r#type: Option<String>,

    #[schemars(description = "Where the memory came from. Defaults to 'agent'.")]
    pub source: Option<String>,

    #[schemars(description = "Importance 0.0-1.0. Defaults to 0.5.")]
    pub importance: Option<f64>,

    #[schemars(description = "Optional JSON metadata blob")]
    pub metadata: Option<serde_json::Value>,

    #[schemars(
        description = "If set, also fold the content into the concept index under this workspace-relative path"
    )]
    pub index_path: Option<String>,
}

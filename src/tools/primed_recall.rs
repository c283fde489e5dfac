use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PrimedRecallParams {
    #[schemars(description = "Natural language query to search memories")]
    pub query: String,

    #[schemars(
        description = "Recent conversation items, oldest first. The last few seed spreading activation."
    )]
    pub context: Option<Vec<String>>,

    #[schemars(description = "Maximum number of results. Defaults to 10.")]
    pub limit: Option<usize>,
}

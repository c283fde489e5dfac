use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForgetMemoryParams {
    #[schemars(description = "ID of the memory to forget. Required unless 'query' is provided.")]
    pub memory_id: Option<String>,

    #[schemars(
        description = "Forget every memory this query recalls (up to 5). Ignored when memory_id is set."
    )]
    pub query: Option<String>,

    #[schemars(description = "Permanently delete instead of soft delete (default: false). Only with memory_id.")]
    pub hard_delete: Option<bool>,
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConceptLookupParams {
    #[schemars(description = "The user message or question to find background for")]
    pub query: String,

    #[schemars(
        description = "Anchors of the current project to always include when the index knows them"
    )]
    pub project_anchors: Option<Vec<String>>,

    #[schemars(
        description = "Also match anchors by embedding similarity, not only by text. Defaults to true."
    )]
    pub semantic: Option<bool>,
}

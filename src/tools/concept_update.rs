use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConceptUpdateParams {
    #[schemars(description = "Markdown content that was just written to the workspace")]
    pub content: String,

    #[schemars(
        description = "Workspace-relative path of the content, e.g. 'memory/2024-05-01.md'. Its first segment becomes the source label."
    )]
    pub path: String,
}

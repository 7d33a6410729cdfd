//! Knowledge base search tool.
//!
//! Looks the user's question up in the static product knowledge base.
//! When nothing matches, the tool still succeeds and returns the single
//! "not found" record so the model can say so instead of escalating.

use std::sync::Arc;

use async_trait::async_trait;
use supportdesk_core::error::ToolError;
use supportdesk_core::message::ToolArguments;
use supportdesk_core::tool::{Tool, ToolResult};
use supportdesk_knowledge::DocumentStore;
use tracing::debug;

pub const TOOL_NAME: &str = "search_product_knowledge_base";

pub struct KnowledgeBaseSearchTool {
    store: Arc<DocumentStore>,
}

impl KnowledgeBaseSearchTool {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for KnowledgeBaseSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the internal product knowledge base for answers to customer queries. \
         Use this tool for questions about policies, shipping, product features, or general information. \
         The query should be a concise summary of the user's question related to the knowledge base."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A short phrase to look for in article titles and bodies"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolResult, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let articles = self.store.search(query);
        debug!(query, matches = articles.len(), "Knowledge base searched");

        ToolResult::json(&articles)
    }
}

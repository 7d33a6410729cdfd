//! Built-in tools for SupportDesk.
//!
//! Two tools make up the default catalog:
//! - `search_product_knowledge_base`: look answers up in the document store
//! - `request_human_handoff`: escalate the conversation to a person

pub mod human_handoff;
pub mod knowledge_base_search;

use std::sync::Arc;

use supportdesk_core::error::ToolError;
use supportdesk_core::tool::ToolRegistry;
use supportdesk_knowledge::DocumentStore;

pub use human_handoff::HumanHandoffTool;
pub use knowledge_base_search::KnowledgeBaseSearchTool;

/// Name of the tool whose successful execution ends the turn with a handoff.
pub const HANDOFF_TOOL: &str = human_handoff::TOOL_NAME;

/// Name of the knowledge base lookup tool.
pub const KNOWLEDGE_BASE_TOOL: &str = knowledge_base_search::TOOL_NAME;

/// Create the default tool registry over the given document store.
pub fn default_registry(store: Arc<DocumentStore>) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(KnowledgeBaseSearchTool::new(store)))?;
    registry.register(Box::new(HumanHandoffTool))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_tools_in_order() {
        let registry = default_registry(Arc::new(DocumentStore::new())).unwrap();
        assert_eq!(registry.names(), vec![KNOWLEDGE_BASE_TOOL, HANDOFF_TOOL]);
    }
}

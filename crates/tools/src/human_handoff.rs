//! Human handoff tool.
//!
//! The model calls this when it cannot resolve the issue with the other
//! tools, or the customer asks for a person. The executor recognises the
//! tool by name and ends the turn after it runs.

use async_trait::async_trait;
use supportdesk_core::error::ToolError;
use supportdesk_core::message::ToolArguments;
use supportdesk_core::tool::{Tool, ToolResult};
use tracing::warn;

pub const TOOL_NAME: &str = "request_human_handoff";

pub struct HumanHandoffTool;

#[async_trait]
impl Tool for HumanHandoffTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Initiates a transfer to a human customer support agent. \
         Use this tool when the AI cannot resolve the customer's issue, requires personal information, \
         or if the customer explicitly requests to speak with a human. \
         The 'reason' should concisely explain why a human handoff is needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the conversation needs a human agent"
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolResult, ToolError> {
        let reason = arguments
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified");

        warn!(reason, "Escalating to human agent");

        Ok(ToolResult::text(
            "Your request has been escalated to a human agent. Please wait while we connect you.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handoff_acknowledges_escalation() {
        let mut args = ToolArguments::new();
        args.insert("reason".into(), serde_json::json!("customer asked for a manager"));

        let result = HumanHandoffTool.execute(&args).await.unwrap();
        assert!(result.output.contains("escalated to a human agent"));
    }

    #[tokio::test]
    async fn handoff_tolerates_missing_reason() {
        let result = HumanHandoffTool.execute(&ToolArguments::new()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn tool_definition() {
        let def = HumanHandoffTool.to_definition();
        assert_eq!(def.name, "request_human_handoff");
    }
}

//! Tool execution for one assistant message.
//!
//! Calls run sequentially in the order the model issued them. The first
//! unknown tool, failed tool, or successful handoff stops the batch; any
//! calls after it are never run.

use std::sync::Arc;
use std::time::Instant;

use supportdesk_core::error::{InvariantViolation, ToolError};
use supportdesk_core::event::{DomainEvent, EventBus};
use supportdesk_core::message::{Message, SyntheticKind, ToolCall};
use supportdesk_core::tool::ToolRegistry;
use supportdesk_tools::HANDOFF_TOOL;
use tracing::{error, info, warn};

use crate::state::{ConversationState, StateDelta};

pub const UNKNOWN_TOOL_APOLOGY: &str =
    "There was an error trying to use a tool. Let me connect you to a human agent.";

pub const TOOL_FAILURE_APOLOGY: &str = "I encountered an error while trying to fulfill your request using a tool. Let me connect you to a human agent.";

pub const DEFAULT_HANDOFF_REASON: &str = "No specific reason provided.";

pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Run the pending tool calls of the latest assistant message.
    pub async fn execute(&self, state: &ConversationState) -> Result<StateDelta, InvariantViolation> {
        let calls = state.pending_tool_calls()?;
        let session_id = state.session_id().as_str();
        let mut delta = StateDelta::default();

        for call in calls {
            if !self.tools.contains(&call.name) {
                error!(
                    session_id,
                    tool = %call.name,
                    "Model requested a tool that is not registered"
                );
                delta.messages.push(
                    Message::tool_result(
                        &call.id,
                        format!(
                            "Error: The assistant tried to use an unknown tool: '{}'. This suggests an issue with the agent's logic.",
                            call.name
                        ),
                    )
                    .marked(SyntheticKind::ToolError),
                );
                delta
                    .messages
                    .push(Message::synthetic(SyntheticKind::Apology, UNKNOWN_TOOL_APOLOGY));
                return Ok(delta.with_handoff(format!("Unknown tool requested: {}", call.name)));
            }

            let start = Instant::now();
            let result = self.tools.invoke(&call.name, &call.arguments).await;
            self.publish_executed(session_id, call, result.is_ok(), start);

            match result {
                Ok(output) => {
                    info!(session_id, tool = %call.name, "Tool executed");
                    delta.messages.push(Message::tool_result(&call.id, output.output));
                    delta.tools_used.push(call.name.clone());

                    if call.name == HANDOFF_TOOL {
                        let reason = call.str_arg("reason").unwrap_or(DEFAULT_HANDOFF_REASON);
                        delta.messages.push(Message::synthetic(
                            SyntheticKind::HandoffConfirmation,
                            format!(
                                "Handoff requested. Reason: {reason}. A human agent will be with you shortly."
                            ),
                        ));
                        return Ok(delta.with_handoff(reason));
                    }
                }
                Err(e) => {
                    let cause = match &e {
                        ToolError::ExecutionFailed { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    warn!(session_id, tool = %call.name, error = %cause, "Tool execution failed");
                    delta.messages.push(
                        Message::tool_result(
                            &call.id,
                            format!(
                                "Error executing tool '{}': {cause}. This issue requires human intervention.",
                                call.name
                            ),
                        )
                        .marked(SyntheticKind::ToolError),
                    );
                    delta
                        .messages
                        .push(Message::synthetic(SyntheticKind::Apology, TOOL_FAILURE_APOLOGY));
                    return Ok(delta.with_handoff(format!("Tool '{}' failed: {cause}", call.name)));
                }
            }
        }

        Ok(delta)
    }

    fn publish_executed(&self, session_id: &str, call: &ToolCall, success: bool, start: Instant) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                session_id: session_id.to_string(),
                tool_name: call.name.clone(),
                success,
                duration_ms: start.elapsed().as_millis() as u64,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use supportdesk_core::message::{Role, SessionId, ToolArguments};
    use supportdesk_core::tool::{Tool, ToolResult};
    use supportdesk_tools::HumanHandoffTool;

    use crate::test_helpers::make_tool_call;

    /// Counts its invocations; fails when asked to.
    struct CountingTool {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Counts calls"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, arguments: &ToolArguments) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if arguments.get("fail").is_some() {
                return Err(ToolError::InvalidArguments("backend unavailable".into()));
            }
            Ok(ToolResult::text("counted"))
        }
    }

    fn registry(calls: &Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(CountingTool {
                name: "counter",
                calls: calls.clone(),
            }))
            .unwrap();
        registry.register(Box::new(HumanHandoffTool)).unwrap();
        Arc::new(registry)
    }

    fn state_with(calls: Vec<ToolCall>) -> ConversationState {
        let mut state = ConversationState::new(SessionId::from("s1"));
        state.begin_turn("help");
        state
            .apply(StateDelta::message(Message::assistant_with_tool_calls("", calls)))
            .unwrap();
        state
    }

    #[tokio::test]
    async fn successful_batch_records_every_tool() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let state = state_with(vec![
            make_tool_call("c1", "counter", serde_json::json!({})),
            make_tool_call("c2", "counter", serde_json::json!({})),
        ]);

        let delta = executor.execute(&state).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(delta.messages.len(), 2);
        assert!(delta.messages.iter().all(|m| m.role == Role::Tool));
        assert_eq!(delta.tools_used, vec!["counter", "counter"]);
        assert!(!delta.requests_handoff());
    }

    #[tokio::test]
    async fn unknown_tool_short_circuits() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let state = state_with(vec![
            make_tool_call("c1", "refund_order", serde_json::json!({})),
            make_tool_call("c2", "counter", serde_json::json!({})),
        ]);

        let delta = executor.execute(&state).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(delta.messages.len(), 2);
        assert_eq!(delta.messages[0].role, Role::Tool);
        assert!(delta.messages[0].content.contains("unknown tool: 'refund_order'"));
        assert_eq!(delta.messages[1].content, UNKNOWN_TOOL_APOLOGY);
        assert!(delta.requests_handoff());
        assert!(delta.tools_used.is_empty());
    }

    #[tokio::test]
    async fn handoff_short_circuits_remaining_calls() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let state = state_with(vec![
            make_tool_call("c1", "counter", serde_json::json!({})),
            make_tool_call("c2", HANDOFF_TOOL, serde_json::json!({"reason": "wants a manager"})),
            make_tool_call("c3", "counter", serde_json::json!({})),
        ]);

        let delta = executor.execute(&state).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(delta.tools_used, vec!["counter", HANDOFF_TOOL]);
        assert_eq!(delta.messages.len(), 3);
        assert_eq!(
            delta.messages[2].content,
            "Handoff requested. Reason: wants a manager. A human agent will be with you shortly."
        );
        assert_eq!(delta.handoff.as_deref(), Some("wants a manager"));
    }

    #[tokio::test]
    async fn handoff_without_reason_uses_default() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let state = state_with(vec![make_tool_call("c1", HANDOFF_TOOL, serde_json::json!({}))]);

        let delta = executor.execute(&state).await.unwrap();
        assert!(delta.messages[1].content.contains(DEFAULT_HANDOFF_REASON));
        assert_eq!(delta.handoff.as_deref(), Some(DEFAULT_HANDOFF_REASON));
    }

    #[tokio::test]
    async fn tool_failure_escalates_with_cause() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let state = state_with(vec![
            make_tool_call("c1", "counter", serde_json::json!({"fail": true})),
            make_tool_call("c2", "counter", serde_json::json!({})),
        ]);

        let delta = executor.execute(&state).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(delta.messages[0].content.starts_with("Error executing tool 'counter'"));
        assert!(delta.messages[0].content.contains("backend unavailable"));
        assert_eq!(delta.messages[1].content, TOOL_FAILURE_APOLOGY);
        assert!(delta.requests_handoff());
    }

    #[tokio::test]
    async fn execute_without_pending_calls_is_an_invariant_violation() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = ToolExecutor::new(registry(&count));
        let mut state = ConversationState::new(SessionId::from("s1"));
        state.begin_turn("hi");

        let err = executor.execute(&state).await.unwrap_err();
        assert_eq!(err, InvariantViolation::NoPendingToolCalls);
    }

    #[tokio::test]
    async fn publishes_tool_executed_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let executor = ToolExecutor::new(registry(&count)).with_event_bus(bus);
        let state = state_with(vec![make_tool_call("c1", "counter", serde_json::json!({}))]);

        executor.execute(&state).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::ToolExecuted { success: true, .. }
        ));
    }
}

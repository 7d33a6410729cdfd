//! The turn controller: drives one user turn through the
//! Reasoning → ExecutingTools → Done state machine.

use std::sync::Arc;

use serde::Serialize;
use supportdesk_core::error::{Error, InvariantViolation, Result};
use supportdesk_core::event::{DomainEvent, EventBus};
use supportdesk_core::message::{Message, SyntheticKind};
use supportdesk_core::tool::ToolRegistry;
use tracing::{debug, error, info, warn};

use crate::executor::ToolExecutor;
use crate::reasoner::{REASONING_APOLOGY, Reasoner};
use crate::state::{ConversationState, StateDelta, TurnPhase};

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// What a finished turn hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Content of the final assistant message
    pub reply: String,
    pub handoff_requested: bool,
    pub handoff_reason: Option<String>,
    /// Tools that ran successfully during this turn, in order
    pub tools_used: Vec<String>,
    /// Everything appended during this turn, starting with the user message
    pub new_messages: Vec<Message>,
}

/// Where the state machine goes after a step.
///
/// Pure: depends only on the phase just completed and the state it left.
pub fn next_phase(phase: TurnPhase, state: &ConversationState) -> TurnPhase {
    match phase {
        TurnPhase::Reasoning => {
            let wants_tools = state
                .last_message()
                .is_some_and(|m| m.is_assistant() && m.has_tool_calls());
            if wants_tools && !state.human_handoff_requested() {
                TurnPhase::ExecutingTools
            } else {
                TurnPhase::Done
            }
        }
        TurnPhase::ExecutingTools => {
            if state.human_handoff_requested() {
                TurnPhase::Done
            } else {
                TurnPhase::Reasoning
            }
        }
        TurnPhase::Done => TurnPhase::Done,
    }
}

pub struct TurnController {
    reasoner: Reasoner,
    executor: ToolExecutor,
    event_bus: Arc<EventBus>,
    max_tool_rounds: u32,
}

impl TurnController {
    pub fn new(reasoner: Reasoner, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            reasoner,
            executor: ToolExecutor::new(tools).with_event_bus(event_bus.clone()),
            event_bus,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Maximum executor rounds per turn before escalating.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run one user turn to completion.
    ///
    /// The turn works on a copy of `state` and writes it back only once the
    /// turn reaches `Done`. If the turn fails or the future is dropped, the
    /// session is left exactly as it was.
    pub async fn run_turn(&self, state: &mut ConversationState, input: &str) -> Result<TurnOutcome> {
        let mut draft = state.clone();
        let turn_start = draft.messages().len();
        let session_id = draft.session_id().to_string();

        draft.begin_turn(input);
        info!(session_id = %session_id, "Turn started");
        self.event_bus.publish(DomainEvent::TurnStarted {
            session_id: session_id.clone(),
            content_preview: input.chars().take(80).collect(),
            timestamp: chrono::Utc::now(),
        });

        let mut phase = TurnPhase::Reasoning;
        let mut tool_rounds = 0;

        while phase != TurnPhase::Done {
            debug!(session_id = %session_id, ?phase, tool_rounds, "Turn step");
            let completed = phase;

            match phase {
                TurnPhase::Reasoning => {
                    let delta = self.reasoning_step(&draft).await;
                    self.commit(&mut draft, delta)?;
                }
                TurnPhase::ExecutingTools => {
                    if tool_rounds >= self.max_tool_rounds {
                        warn!(
                            session_id = %session_id,
                            tool_rounds,
                            "Tool round limit reached, escalating"
                        );
                        let delta = StateDelta::message(Message::synthetic(
                            SyntheticKind::Apology,
                            REASONING_APOLOGY,
                        ))
                        .with_handoff(format!(
                            "Tool round limit of {} reached",
                            self.max_tool_rounds
                        ));
                        self.commit(&mut draft, delta)?;
                        break;
                    }

                    tool_rounds += 1;
                    let delta = self.executor.execute(&draft).await.map_err(invariant)?;
                    self.commit(&mut draft, delta)?;
                }
                TurnPhase::Done => {}
            }

            phase = next_phase(completed, &draft);
        }

        let reply = match draft.last_message() {
            Some(m) if m.is_assistant() => m.content.clone(),
            last => {
                let last_role = last.map_or("none", |m| m.role.as_str()).to_string();
                return Err(invariant(InvariantViolation::TurnEndedWithoutReply { last_role }));
            }
        };

        if let Some(reason) = draft.handoff_reason() {
            warn!(session_id = %session_id, reason, "Conversation handed off to a human");
            self.event_bus.publish(DomainEvent::HandoffRequested {
                session_id: session_id.clone(),
                reason: reason.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        self.event_bus.publish(DomainEvent::TurnCompleted {
            session_id: session_id.clone(),
            handoff_requested: draft.human_handoff_requested(),
            timestamp: chrono::Utc::now(),
        });
        info!(
            session_id = %session_id,
            handoff = draft.human_handoff_requested(),
            tools = draft.tools_used().len(),
            "Turn completed"
        );

        let outcome = TurnOutcome {
            reply,
            handoff_requested: draft.human_handoff_requested(),
            handoff_reason: draft.handoff_reason().map(String::from),
            tools_used: draft.tools_used().to_vec(),
            new_messages: draft.messages()[turn_start..].to_vec(),
        };
        *state = draft;
        Ok(outcome)
    }

    async fn reasoning_step(&self, draft: &ConversationState) -> StateDelta {
        let session_id = draft.session_id().to_string();
        match self.reasoner.reason(draft).await {
            Ok(response) => {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id,
                    model: response.model.clone(),
                    tool_calls: response.message.tool_calls.len(),
                    tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
                    timestamp: chrono::Utc::now(),
                });
                self.reasoner.on_success(response)
            }
            Err(e) => {
                self.event_bus.publish(DomainEvent::ReasoningFailed {
                    session_id,
                    retry_count: draft.retry_count(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                self.reasoner.on_failure(draft, &e)
            }
        }
    }

    fn commit(&self, draft: &mut ConversationState, delta: StateDelta) -> Result<()> {
        draft.apply(delta).map_err(invariant)
    }
}

fn invariant(violation: InvariantViolation) -> Error {
    error!(error = %violation, "Turn aborted on invariant violation");
    Error::Invariant(violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        ScriptedProvider, make_text_response, make_tool_call, make_tool_call_response,
    };
    use supportdesk_core::error::ProviderError;
    use supportdesk_core::message::{Role, SessionId};
    use supportdesk_core::provider::ProviderResponse;
    use supportdesk_knowledge::DocumentStore;
    use supportdesk_tools::{HANDOFF_TOOL, KNOWLEDGE_BASE_TOOL, default_registry};

    fn registry() -> Arc<ToolRegistry> {
        let store = DocumentStore::from_entries([
            ("Policies", "Return Policy", "Items can be returned within 30 days of purchase."),
            ("Shipping", "Shipping Policy", "Standard shipping takes 3-5 business days."),
        ]);
        Arc::new(default_registry(Arc::new(store)).unwrap())
    }

    fn controller(provider: Arc<ScriptedProvider>) -> TurnController {
        let tools = registry();
        let reasoner = Reasoner::new(provider, "mock-model", 0.0, tools.clone());
        TurnController::new(reasoner, tools, Arc::new(EventBus::default()))
    }

    fn fresh() -> ConversationState {
        ConversationState::new(SessionId::from("test-session"))
    }

    fn return_policy_script() -> Vec<std::result::Result<ProviderResponse, ProviderError>> {
        vec![
            Ok(make_tool_call_response(vec![make_tool_call(
                "call_1",
                KNOWLEDGE_BASE_TOOL,
                serde_json::json!({"query": "return"}),
            )])),
            Ok(make_text_response("You can return items within 30 days of purchase.")),
        ]
    }

    #[test]
    fn transitions() {
        let mut state = fresh();
        state.begin_turn("hi");
        assert_eq!(next_phase(TurnPhase::Reasoning, &state), TurnPhase::Done);

        let call = make_tool_call("c1", KNOWLEDGE_BASE_TOOL, serde_json::json!({}));
        state
            .apply(StateDelta::message(Message::assistant_with_tool_calls("", vec![call])))
            .unwrap();
        assert_eq!(next_phase(TurnPhase::Reasoning, &state), TurnPhase::ExecutingTools);

        state
            .apply(StateDelta::message(Message::tool_result("c1", "ok")))
            .unwrap();
        assert_eq!(next_phase(TurnPhase::ExecutingTools, &state), TurnPhase::Reasoning);

        state.apply(StateDelta::default().with_handoff("x")).unwrap();
        assert_eq!(next_phase(TurnPhase::ExecutingTools, &state), TurnPhase::Done);
        assert_eq!(next_phase(TurnPhase::Done, &state), TurnPhase::Done);
    }

    #[tokio::test]
    async fn return_policy_turn() {
        let provider = Arc::new(ScriptedProvider::new(return_policy_script()));
        let controller = controller(provider.clone());
        let mut state = fresh();

        let outcome = controller
            .run_turn(&mut state, "What is your return policy?")
            .await
            .unwrap();

        assert_eq!(outcome.reply, "You can return items within 30 days of purchase.");
        assert!(!outcome.handoff_requested);
        assert_eq!(outcome.tools_used, vec![KNOWLEDGE_BASE_TOOL]);

        let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert!(state.messages()[2].content.contains("Return Policy"));

        // The second call saw the tool result.
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.last().map(|m| m.role), Some(Role::Tool));
        assert_eq!(requests[1].tools.len(), 2);
    }

    #[tokio::test]
    async fn three_failed_turns_rephrase_twice_then_hand_off() {
        let provider = Arc::new(ScriptedProvider::failing(3));
        let controller = controller(provider);
        let mut state = fresh();

        let first = controller.run_turn(&mut state, "asdf").await.unwrap();
        let second = controller.run_turn(&mut state, "asdf?").await.unwrap();
        let third = controller.run_turn(&mut state, "asdf!").await.unwrap();

        assert!(!first.handoff_requested);
        assert!(!second.handoff_requested);
        assert!(third.handoff_requested);
        assert_eq!(state.retry_count(), 2);

        let synthetic: Vec<SyntheticKind> = state
            .messages()
            .iter()
            .filter_map(|m| m.synthetic_kind())
            .collect();
        assert_eq!(
            synthetic,
            vec![SyntheticKind::Rephrase, SyntheticKind::Rephrase, SyntheticKind::Apology]
        );
        assert_eq!(third.reply, REASONING_APOLOGY);
    }

    #[tokio::test]
    async fn success_between_failures_resets_retries() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network("reset".into())),
            Ok(make_text_response("Sure.")),
            Err(ProviderError::Network("reset".into())),
        ]));
        let controller = controller(provider);
        let mut state = fresh();

        controller.run_turn(&mut state, "a").await.unwrap();
        assert_eq!(state.retry_count(), 1);
        controller.run_turn(&mut state, "b").await.unwrap();
        assert_eq!(state.retry_count(), 0);
        let outcome = controller.run_turn(&mut state, "c").await.unwrap();
        assert!(!outcome.handoff_requested);
        assert_eq!(state.retry_count(), 1);
    }

    #[tokio::test]
    async fn handoff_in_batch_stops_later_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(make_tool_call_response(vec![
            make_tool_call("c1", KNOWLEDGE_BASE_TOOL, serde_json::json!({"query": "refund"})),
            make_tool_call("c2", HANDOFF_TOOL, serde_json::json!({"reason": "refund dispute"})),
            make_tool_call("c3", KNOWLEDGE_BASE_TOOL, serde_json::json!({"query": "shipping"})),
        ]))]));
        let controller = controller(provider.clone());
        let mut state = fresh();

        let outcome = controller.run_turn(&mut state, "I want a human").await.unwrap();
        assert!(outcome.handoff_requested);
        assert_eq!(outcome.handoff_reason.as_deref(), Some("refund dispute"));
        assert_eq!(outcome.tools_used, vec![KNOWLEDGE_BASE_TOOL, HANDOFF_TOOL]);
        assert!(outcome.reply.starts_with("Handoff requested. Reason: refund dispute."));
        assert_eq!(provider.call_count(), 1);

        let results = state.messages().iter().filter(|m| m.role == Role::Tool).count();
        assert_eq!(results, 2);
    }

    #[tokio::test]
    async fn unknown_tool_hands_off() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(make_tool_call_response(vec![
            make_tool_call("c1", "cancel_order", serde_json::json!({})),
            make_tool_call("c2", KNOWLEDGE_BASE_TOOL, serde_json::json!({"query": "x"})),
        ]))]));
        let controller = controller(provider);
        let mut state = fresh();

        let outcome = controller.run_turn(&mut state, "cancel it").await.unwrap();
        assert!(outcome.handoff_requested);
        assert!(outcome.tools_used.is_empty());
        let results = state.messages().iter().filter(|m| m.role == Role::Tool).count();
        assert_eq!(results, 1);
    }

    #[tokio::test]
    async fn next_turn_clears_handoff() {
        let mut script = vec![Ok(make_tool_call_response(vec![make_tool_call(
            "c1",
            HANDOFF_TOOL,
            serde_json::json!({"reason": "asked for a person"}),
        )]))];
        script.push(Ok(make_text_response("Welcome back.")));
        let controller = controller(Arc::new(ScriptedProvider::new(script)));
        let mut state = fresh();

        assert!(controller.run_turn(&mut state, "human please").await.unwrap().handoff_requested);
        let outcome = controller.run_turn(&mut state, "never mind").await.unwrap();
        assert!(!outcome.handoff_requested);
        assert!(!state.human_handoff_requested());
        assert!(state.tools_used().is_empty());
    }

    #[tokio::test]
    async fn tool_round_limit_escalates() {
        let looping = |id: &str| -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(make_tool_call_response(vec![make_tool_call(
                id,
                KNOWLEDGE_BASE_TOOL,
                serde_json::json!({"query": "shipping"}),
            )]))
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            looping("c1"),
            looping("c2"),
            looping("c3"),
        ]));
        let controller = controller(provider.clone()).with_max_tool_rounds(2);
        let mut state = fresh();

        let outcome = controller.run_turn(&mut state, "shipping?").await.unwrap();
        assert!(outcome.handoff_requested);
        assert_eq!(outcome.reply, REASONING_APOLOGY);
        assert_eq!(outcome.tools_used.len(), 2);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn invariant_violation_leaves_session_untouched() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_text_response("Hello!")),
            Ok(make_tool_call_response(vec![
                make_tool_call("dup", KNOWLEDGE_BASE_TOOL, serde_json::json!({"query": "a"})),
                make_tool_call("dup", KNOWLEDGE_BASE_TOOL, serde_json::json!({"query": "b"})),
            ])),
        ]));
        let controller = controller(provider);
        let mut state = fresh();

        controller.run_turn(&mut state, "hi").await.unwrap();
        let before = state.messages().len();

        let err = controller.run_turn(&mut state, "returns?").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Invariant(InvariantViolation::DuplicateToolCallId { .. })
        ));
        assert_eq!(state.messages().len(), before);
    }

    #[tokio::test]
    async fn same_script_gives_same_outcome() {
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let controller = controller(Arc::new(ScriptedProvider::new(return_policy_script())));
            let mut state = fresh();
            let outcome = controller
                .run_turn(&mut state, "What is your return policy?")
                .await
                .unwrap();
            outcomes.push((outcome.reply, outcome.handoff_requested, state.messages().len()));
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[tokio::test]
    async fn every_done_ends_on_assistant_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_text_response("Hi there.")),
            Err(ProviderError::Timeout("slow".into())),
        ]));
        let controller = controller(provider);
        let mut state = fresh();

        for input in ["hello", "again"] {
            controller.run_turn(&mut state, input).await.unwrap();
            assert!(state.last_message().is_some_and(|m| m.is_assistant()));
        }
    }

    #[tokio::test]
    async fn publishes_turn_lifecycle_events() {
        let provider = Arc::new(ScriptedProvider::new(return_policy_script()));
        let controller = controller(provider);
        let mut rx = controller.event_bus().subscribe();
        let mut state = fresh();

        controller.run_turn(&mut state, "What is your return policy?").await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::TurnStarted { .. } => "started",
                DomainEvent::ResponseGenerated { .. } => "response",
                DomainEvent::ReasoningFailed { .. } => "failed",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::HandoffRequested { .. } => "handoff",
                DomainEvent::TurnCompleted { .. } => "completed",
            });
        }
        assert_eq!(names, vec!["started", "response", "tool", "response", "completed"]);
    }
}

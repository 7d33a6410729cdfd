//! Per-session conversation state and the deltas that change it.
//!
//! The reasoner and the executor never touch [`ConversationState`] directly.
//! They return a [`StateDelta`] and the turn controller applies it, which is
//! where the tool-call pairing rules are checked.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use supportdesk_core::error::InvariantViolation;
use supportdesk_core::message::{Message, Role, SessionId, ToolCall};

/// The phases a turn moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Waiting on the model
    Reasoning,
    /// Running the tool calls of the latest assistant message
    ExecutingTools,
    /// Terminal; control returns to the caller
    Done,
}

/// A batch of changes produced by one reasoning or execution step.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    /// Messages to append, in order
    pub messages: Vec<Message>,

    /// Tool names to record as used in this turn
    pub tools_used: Vec<String>,

    /// New value for the consecutive-failure counter, if it changed
    pub retry_count: Option<u32>,

    /// Set when the step escalated; carries the handoff reason
    pub handoff: Option<String>,
}

impl StateDelta {
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_handoff(mut self, reason: impl Into<String>) -> Self {
        self.handoff = Some(reason.into());
        self
    }

    pub fn requests_handoff(&self) -> bool {
        self.handoff.is_some()
    }
}

/// Everything the agent knows about one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    session_id: SessionId,
    messages: Vec<Message>,
    tools_used: Vec<String>,
    human_handoff_requested: bool,
    handoff_reason: Option<String>,
    retry_count: u32,
}

impl ConversationState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            tools_used: Vec::new(),
            human_handoff_requested: false,
            handoff_reason: None,
            retry_count: 0,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub fn human_handoff_requested(&self) -> bool {
        self.human_handoff_requested
    }

    pub fn handoff_reason(&self) -> Option<&str> {
        self.handoff_reason.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Start a new user turn.
    ///
    /// Clears the per-turn bookkeeping and the handoff flag, then appends the
    /// user message. The retry counter is left alone so consecutive failed
    /// turns keep counting toward escalation.
    pub fn begin_turn(&mut self, input: impl Into<String>) {
        self.tools_used.clear();
        self.human_handoff_requested = false;
        self.handoff_reason = None;
        self.messages.push(Message::user(input));
    }

    /// The tool calls of the latest assistant message, if that message is
    /// the last one in the history.
    pub fn pending_tool_calls(&self) -> Result<&[ToolCall], InvariantViolation> {
        match self.messages.last() {
            Some(msg) if msg.is_assistant() && msg.has_tool_calls() => Ok(&msg.tool_calls),
            _ => Err(InvariantViolation::NoPendingToolCalls),
        }
    }

    /// Append a delta, enforcing the tool-call pairing rules.
    ///
    /// Nothing is applied unless the whole delta is valid.
    pub fn apply(&mut self, delta: StateDelta) -> Result<(), InvariantViolation> {
        let mut open = self.open_tool_call_ids();
        for msg in &delta.messages {
            check_message(msg, &mut open)?;
        }

        self.messages.extend(delta.messages);
        self.tools_used.extend(delta.tools_used);
        if let Some(retry_count) = delta.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(reason) = delta.handoff {
            self.human_handoff_requested = true;
            self.handoff_reason = Some(reason);
        }
        Ok(())
    }

    /// Ids of tool calls that can still receive a result: those of the most
    /// recent assistant message, minus the ones already answered after it.
    fn open_tool_call_ids(&self) -> HashSet<String> {
        let mut open = HashSet::new();
        for msg in &self.messages {
            track(msg, &mut open);
        }
        open
    }
}

fn track(msg: &Message, open: &mut HashSet<String>) {
    match msg.role {
        Role::Tool => {
            if let Some(id) = &msg.tool_call_id {
                open.remove(id);
            }
        }
        _ => {
            open.clear();
            open.extend(msg.tool_calls.iter().map(|c| c.id.clone()));
        }
    }
}

fn check_message(msg: &Message, open: &mut HashSet<String>) -> Result<(), InvariantViolation> {
    match msg.role {
        Role::Tool => {
            let id = msg
                .tool_call_id
                .as_ref()
                .ok_or(InvariantViolation::MissingToolCallId)?;
            if !open.remove(id) {
                return Err(InvariantViolation::OrphanToolResult {
                    tool_call_id: id.clone(),
                });
            }
        }
        _ => {
            let mut seen = HashSet::new();
            for call in &msg.tool_calls {
                if !seen.insert(call.id.as_str()) {
                    return Err(InvariantViolation::DuplicateToolCallId {
                        tool_call_id: call.id.clone(),
                    });
                }
            }
            track(msg, open);
        }
    }
    Ok(())
}

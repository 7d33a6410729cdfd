//! The reasoning step: one model call plus the retry policy around it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use supportdesk_core::error::ReasoningError;
use supportdesk_core::message::{Message, Role, SyntheticKind};
use supportdesk_core::provider::{Provider, ProviderRequest, ProviderResponse};
use supportdesk_core::tool::ToolRegistry;
use tracing::{debug, warn};

use crate::state::{ConversationState, StateDelta};

pub const REPHRASE_MESSAGE: &str =
    "I'm having a bit of trouble understanding. Could you please rephrase your question?";

pub const REASONING_APOLOGY: &str = "I apologize, but I'm unable to process your request at this moment. Let me connect you to a human agent.";

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the fixed system instruction for the given tool catalog.
pub fn system_prompt(tool_names: &[&str]) -> String {
    format!(
        "You are a helpful customer support assistant. Your goal is to resolve customer inquiries efficiently.\n\
         You have access to the following tools: {}.\n\n\
         If a tool is available that can answer the user's question, you MUST use it.\n\
         If the user asks about policies, shipping, or general information, use the 'search_product_knowledge_base' tool.\n\
         If you cannot resolve the issue with the available tools, or if the user explicitly asks to speak to a human, \
         use the 'request_human_handoff' tool with a clear reason.\n\
         Always try to use a tool before escalating to a human, unless a direct human request is made \
         or the issue is clearly out of scope for automated tools.\n\
         When using tools, ensure all required arguments are provided.\n\
         Provide concise and helpful responses.",
        tool_names.join(", ")
    )
}

/// Wraps the provider with the system prompt, the tool catalog and the
/// bounded retry policy.
pub struct Reasoner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_retries: u32,
    timeout: Duration,
}

impl Reasoner {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let system_prompt = system_prompt(&tools.names());
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Number of rephrase prompts issued before escalating.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The request for the next model call: system instruction, the full
    /// history and the tool catalog.
    pub fn build_request(&self, state: &ConversationState) -> ProviderRequest {
        let mut messages = Vec::with_capacity(state.messages().len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(normalize_history(state.messages()));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
        }
    }

    /// One model call, bounded by the configured timeout.
    pub async fn reason(&self, state: &ConversationState) -> Result<ProviderResponse, ReasoningError> {
        let request = self.build_request(state);
        debug!(
            session_id = %state.session_id(),
            messages = request.messages.len(),
            "Calling provider"
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ReasoningError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }

    /// A successful call clears the failure counter.
    pub fn on_success(&self, response: ProviderResponse) -> StateDelta {
        StateDelta::message(response.message).with_retry_count(0)
    }

    /// Recover from a failed call: ask the user to rephrase while retries
    /// remain, otherwise apologize and escalate.
    pub fn on_failure(&self, state: &ConversationState, error: &ReasoningError) -> StateDelta {
        let retry_count = state.retry_count();
        if retry_count < self.max_retries {
            warn!(
                session_id = %state.session_id(),
                retry_count,
                error = %error,
                "Reasoning failed, asking user to rephrase"
            );
            StateDelta::message(Message::synthetic(SyntheticKind::Rephrase, REPHRASE_MESSAGE))
                .with_retry_count(retry_count + 1)
        } else {
            warn!(
                session_id = %state.session_id(),
                retry_count,
                error = %error,
                "Reasoning retries exhausted, escalating"
            );
            StateDelta::message(Message::synthetic(SyntheticKind::Apology, REASONING_APOLOGY))
                .with_handoff(format!("Unable to process the request: {error}"))
        }
    }
}

/// Prepare stored history for the model.
///
/// A batch cut short by a handoff leaves tool calls with no result; those
/// calls are dropped from the copy sent to the model so every remaining call
/// is answered. A call counts as answered only by the tool messages directly
/// after its own assistant message, since some backends reuse ids across
/// turns. System messages are never stored, but are skipped here too.
fn normalize_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role != Role::System)
        .map(|(i, m)| {
            let mut m = m.clone();
            if !m.tool_calls.is_empty() {
                let answered: HashSet<&str> = messages[i + 1..]
                    .iter()
                    .take_while(|r| r.role == Role::Tool)
                    .filter_map(|r| r.tool_call_id.as_deref())
                    .collect();
                m.tool_calls.retain(|c| answered.contains(c.id.as_str()));
            }
            m
        })
        .collect()
}

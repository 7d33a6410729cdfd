//! Shared test helpers for the agent crate.

use std::sync::Mutex;
use std::time::Duration;

use supportdesk_core::error::ProviderError;
use supportdesk_core::message::{Message, ToolCall};
use supportdesk_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A mock provider that replays a scripted sequence of outcomes.
///
/// Each call to `complete` returns the next entry in the script.
/// Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Plain text replies, one per call.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    /// `n` consecutive provider failures.
    pub fn failing(n: usize) -> Self {
        Self::new(
            (0..n)
                .map(|_| Err(ProviderError::Network("connection refused".into())))
                .collect(),
        )
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedProvider: no more responses (call #{call})");
        }
        script.remove(0)
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_response(Message::assistant(text))
}

/// Create a response carrying tool calls.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>) -> ProviderResponse {
    make_response(Message::assistant_with_tool_calls("", tool_calls))
}

fn make_response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.as_object().cloned().unwrap_or_default())
}

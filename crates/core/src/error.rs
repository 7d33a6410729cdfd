//! Error types for the SupportDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] carries what can end a turn.

use thiserror::Error;

/// The top-level error type for all SupportDesk operations.
///
/// Provider, reasoning and tool failures are recovered inside the turn and
/// never reach this type.
#[derive(Debug, Error)]
pub enum Error {
    // --- State machine invariant violations ---
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport or model failures reported by a [`crate::Provider`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A failed reasoning step. Always recovered by the reasoner's retry policy,
/// never shown to the user.
#[derive(Debug, Clone, Error)]
pub enum ReasoningError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("reasoning call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool produced unserializable output: {0}")]
    InvalidOutput(String),
}

/// A malformed message sequence or impossible state transition.
///
/// These indicate a programming error, not a user-facing failure, and are
/// fatal to the turn in which they are detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("tool result references call id '{tool_call_id}' with no pending request")]
    OrphanToolResult { tool_call_id: String },

    #[error("tool result message is missing its tool_call_id")]
    MissingToolCallId,

    #[error("tool call id '{tool_call_id}' appears more than once in one assistant message")]
    DuplicateToolCallId { tool_call_id: String },

    #[error("tool execution requested but the last message is not an assistant message with tool calls")]
    NoPendingToolCalls,

    #[error("turn finished without an assistant reply (last role: {last_role})")]
    TurnEndedWithoutReply { last_role: String },
}

//! # SupportDesk Core
//!
//! Domain types, traits, and error definitions for the SupportDesk
//! customer-support agent. This crate has **no framework dependencies**; it
//! defines the model every other crate implements against.
//!
//! ## Seams
//!
//! - [`Provider`]: the external reasoning capability (an LLM backend)
//! - [`Tool`]: a callable handler with a typed argument contract
//! - [`ToolRegistry`]: the closed, name-keyed catalog of tools
//!
//! Implementations live in their own crates and are injected into the agent
//! at start-up.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, InvariantViolation, ProviderError, ReasoningError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role, SessionId, SyntheticKind, ToolArguments, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry, ToolResult};

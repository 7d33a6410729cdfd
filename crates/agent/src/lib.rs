//! The support agent: the heart of SupportDesk.
//!
//! Every user message runs as one **turn** through a small state machine:
//!
//! 1. **Receive** the user message and reset per-turn bookkeeping
//! 2. **Reason**: send the history and tool catalog to the model
//! 3. **If tool calls**: execute them in order, append the results, go to 2
//! 4. **Otherwise**: the turn is done and the last assistant message is the reply
//!
//! A failed model call asks the user to rephrase; repeated failures, unknown
//! tools, failing tools and explicit handoff requests all escalate to a human
//! and end the turn.

pub mod controller;
pub mod executor;
pub mod reasoner;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{TurnController, TurnOutcome, next_phase};
pub use executor::ToolExecutor;
pub use reasoner::{Reasoner, system_prompt};
pub use session::SessionManager;
pub use state::{ConversationState, StateDelta, TurnPhase};

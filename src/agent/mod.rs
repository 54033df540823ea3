//! Agent module for iconagent
//!
//! This module contains the transcript types, the loop controller that
//! drives a run to a terminal state, and the extractor that turns the final
//! reply into an image reference.

pub mod conversation;
pub mod core;
pub mod extractor;

pub use self::core::{Agent, AgentRun, RetryBudget, TerminalState};
pub use conversation::{
    Conversation, ModelTurn, ToolCallRequest, ToolErrorKind, ToolOutcome, ToolResultTurn, Turn,
};
pub use extractor::{extract, FinalAnswer};

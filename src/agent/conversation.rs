//! Conversation transcript for a single agent run
//!
//! The transcript is an append-only list of [`Turn`]s. It is replayed to the
//! backend verbatim on every request, so nothing here reorders, rewrites or
//! prunes turns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier used to correlate the result; unique within a turn
    pub id: String,
    /// Name of the requested capability
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them
    pub arguments: String,
}

impl ToolCallRequest {
    /// Create a new tool call request
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::agent::ToolCallRequest;
    ///
    /// let call = ToolCallRequest::new("call_1", "url_validator", r#"{"url":"https://a.example/x.png"}"#);
    /// assert_eq!(call.name, "url_validator");
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One reply from the model: text, tool calls, or both
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelTurn {
    /// Plain text content, if any
    pub text: Option<String>,
    /// Tool calls requested in this turn, in the order the model listed them
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelTurn {
    /// A text-only reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply that only requests tools
    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: None,
            tool_calls,
        }
    }

    /// Whether the model asked for at least one tool
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content or the empty string
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Why a tool call produced no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// The requested capability is not registered
    UnknownCapability,
    /// Arguments did not satisfy the input schema
    ArgumentValidation,
    /// The capability ran and failed
    ToolExecution,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCapability => write!(f, "UnknownCapabilityError"),
            Self::ArgumentValidation => write!(f, "ArgumentValidationError"),
            Self::ToolExecution => write!(f, "ToolExecutionError"),
        }
    }
}

/// Result payload of a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolOutcome {
    /// Output of a successful invocation
    Success(String),
    /// The call failed; the model sees the kind and message
    Error {
        /// Failure category
        kind: ToolErrorKind,
        /// Human-readable detail
        message: String,
    },
}

/// The result of one tool call, correlated by call id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultTurn {
    /// Capability that was (or would have been) invoked
    pub tool_name: String,
    /// Id of the request this answers
    pub call_id: String,
    /// Output or error
    pub outcome: ToolOutcome,
}

impl ToolResultTurn {
    /// A successful result
    pub fn success(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            outcome: ToolOutcome::Success(output.into()),
        }
    }

    /// A failed result
    pub fn error(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            outcome: ToolOutcome::Error {
                kind,
                message: message.into(),
            },
        }
    }

    /// Whether the call failed
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error { .. })
    }

    /// The error kind, if the call failed
    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Error { kind, .. } => Some(*kind),
            ToolOutcome::Success(_) => None,
        }
    }

    /// Text fed back to the model for this result
    pub fn to_message(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(output) => output.clone(),
            ToolOutcome::Error { kind, message } => format!("Error ({}): {}", kind, message),
        }
    }
}

/// A single step of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    /// The goal that seeds the run
    Goal(String),
    /// A reply from the model
    Model(ModelTurn),
    /// The result of one tool call
    ToolResult(ToolResultTurn),
}

/// Append-only transcript of one run
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a transcript seeded with the goal
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::agent::{Conversation, Turn};
    ///
    /// let conversation = Conversation::seeded("Find the logo of Acme Corp");
    /// assert_eq!(conversation.len(), 1);
    /// assert!(matches!(conversation.turns()[0], Turn::Goal(_)));
    /// ```
    pub fn seeded(goal: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::Goal(goal.into())],
        }
    }

    /// Append a model reply
    pub fn push_model_turn(&mut self, turn: ModelTurn) {
        self.turns.push(Turn::Model(turn));
    }

    /// Append a batch of tool results in the given order
    pub fn push_tool_results(&mut self, results: Vec<ToolResultTurn>) {
        self.turns.extend(results.into_iter().map(Turn::ToolResult));
    }

    /// All turns in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The goal text this run was seeded with
    pub fn goal(&self) -> Option<&str> {
        self.turns.iter().find_map(|t| match t {
            Turn::Goal(goal) => Some(goal.as_str()),
            _ => None,
        })
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript is empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Consume the conversation, returning its turns
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

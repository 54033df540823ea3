//! Error types for iconagent
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for iconagent operations
///
/// The first group of variants is the agent-loop taxonomy: backend failures
/// drive the retry policy, capability failures are turned into tool results
/// the model can react to, and the remaining loop variants describe why a run
/// terminated without an answer.
#[derive(Error, Debug)]
pub enum IconAgentError {
    /// Network, authentication or server-side failure talking to a backend
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend replied but the reply could not be turned into a model turn
    #[error("Backend response error: {0}")]
    BackendResponse(String),

    /// A capability with this name is already registered
    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    /// The model asked for a capability that is not registered
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// Tool arguments did not match the capability's input schema
    #[error("Invalid arguments for '{tool}': {message}")]
    ArgumentValidation {
        /// Capability the arguments were meant for
        tool: String,
        /// What was wrong with them
        message: String,
    },

    /// A capability was invoked and failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution {
        /// Capability that failed
        tool: String,
        /// Failure description
        message: String,
    },

    /// The final model reply did not contain a usable image reference
    #[error("Unparsable answer: {0}")]
    UnparsableAnswer(String),

    /// Backend kept failing after every permitted retry
    #[error("Retry budget exhausted after {retries} retries: {last_error}")]
    RetryBudgetExhausted {
        /// Number of retries that were consumed
        retries: u32,
        /// The backend error that could not be retried
        last_error: String,
    },

    /// The model kept requesting tools without ever answering
    #[error("Turn limit exceeded: limit={limit}, the model never produced a final answer")]
    TurnLimitExceeded {
        /// The configured maximum number of model turns
        limit: usize,
    },

    /// The run was cancelled from outside
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// The run hit its overall deadline
    #[error("Run timed out after {seconds} seconds")]
    Timeout {
        /// The configured deadline
        seconds: u64,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IconAgentError {
    /// Whether the agent loop may retry the request that produced this error
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            IconAgentError::BackendUnavailable(_) | IconAgentError::BackendResponse(_)
        )
    }
}

/// Result type alias for iconagent operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need the error kind downcast to [`IconAgentError`].
pub type Result<T> = anyhow::Result<T>;

//! Base provider trait and common types for iconagent
//!
//! This module defines the Provider trait that every completion backend
//! implements, along with the response and token usage types.

use crate::agent::{ModelTurn, Turn};
use crate::config::ExecutionPolicy;
use crate::error::{IconAgentError, Result};
use crate::tools::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Add another usage report to this one
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Completion response with the normalized model turn and optional usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The reply, normalized into text and tool call requests
    pub turn: ModelTurn,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a new CompletionResponse
    pub fn new(turn: ModelTurn) -> Self {
        Self { turn, usage: None }
    }

    /// Create a new CompletionResponse with token usage
    pub fn with_usage(turn: ModelTurn, usage: TokenUsage) -> Self {
        Self {
            turn,
            usage: Some(usage),
        }
    }
}

/// Provider trait for completion backends
///
/// Implementations translate the transcript into their wire format, send it
/// with the live capability list and execution policy, and normalize the
/// reply. They never retry: retry policy belongs to the agent loop.
///
/// # Examples
///
/// ```no_run
/// use iconagent::agent::{ModelTurn, Turn};
/// use iconagent::config::ExecutionPolicy;
/// use iconagent::error::Result;
/// use iconagent::providers::{CompletionResponse, Provider};
/// use iconagent::tools::Tool;
/// use async_trait::async_trait;
///
/// struct CannedProvider;
///
/// #[async_trait]
/// impl Provider for CannedProvider {
///     fn name(&self) -> &str {
///         "canned"
///     }
///
///     async fn complete(
///         &self,
///         _turns: &[Turn],
///         _tools: &[Tool],
///         _policy: &ExecutionPolicy,
///     ) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new(ModelTurn::text("<img src=\"https://a.example/l.png\">")))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend identity, e.g. "openai" or "azure_openai"
    fn name(&self) -> &str;

    /// Model or deployment the backend is configured with
    fn model(&self) -> String {
        String::new()
    }

    /// Completes the conversation
    ///
    /// # Arguments
    ///
    /// * `turns` - The full transcript, replayed verbatim
    /// * `tools` - Capabilities the model may call on this turn
    /// * `policy` - Token, temperature and tool-choice settings
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` for transport, authentication or
    /// server-side failures and `BackendResponse` for replies that cannot be
    /// normalized into a [`ModelTurn`]
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[Tool],
        policy: &ExecutionPolicy,
    ) -> Result<CompletionResponse>;

    /// Describe the image at `url` using the backend's vision support
    ///
    /// # Default Implementation
    ///
    /// Returns `BackendUnavailable` because not every backend supports
    /// image input.
    async fn describe_image(&self, _url: &str, _instruction: &str) -> Result<String> {
        Err(IconAgentError::BackendUnavailable(format!(
            "{} does not support image description",
            self.name()
        ))
        .into())
    }
}

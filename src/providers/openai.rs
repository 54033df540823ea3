//! OpenAI provider implementation for iconagent
//!
//! Talks to `{api_base}/chat/completions` with bearer authentication. The
//! base URL is configurable so OpenAI-compatible servers work too.

use crate::agent::Turn;
use crate::config::{ExecutionPolicy, OpenAiConfig};
use crate::error::{IconAgentError, Result};
use crate::providers::openai_compat::{
    build_chat_request, build_vision_request, convert_response, first_choice_text, send_chat,
};
use crate::providers::{CompletionResponse, Provider};
use crate::tools::Tool;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Token cap for image descriptions
pub(crate) const DESCRIBE_MAX_TOKENS: u32 = 300;

/// OpenAI chat-completions provider
///
/// # Examples
///
/// ```no_run
/// use iconagent::config::OpenAiConfig;
/// use iconagent::providers::{OpenAiProvider, Provider};
///
/// # fn example() -> iconagent::error::Result<()> {
/// let config = OpenAiConfig {
///     api_key: Some("sk-test".to_string()),
///     ..OpenAiConfig::default()
/// };
/// let provider = OpenAiProvider::new(config)?;
/// assert_eq!(provider.name(), "openai");
/// # Ok(())
/// # }
/// ```
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` if no API key is configured, or an error
    /// if the HTTP client cannot be built
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                IconAgentError::MissingCredentials("openai (set OPENAI_API_KEY)".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("iconagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                IconAgentError::BackendUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized OpenAI provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// The configured API base URL
    pub fn api_base(&self) -> &str {
        &self.config.api_base
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }

    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[Tool],
        policy: &ExecutionPolicy,
    ) -> Result<CompletionResponse> {
        let body = build_chat_request(Some(self.config.model.clone()), turns, tools, policy);
        let request = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key);

        let response = send_chat("OpenAI", request, &body).await?;
        let completion = convert_response(response)?;

        tracing::debug!(
            "OpenAI reply: text={}, tool_calls={}",
            completion.turn.text.is_some(),
            completion.turn.tool_calls.len()
        );

        Ok(completion)
    }

    async fn describe_image(&self, url: &str, instruction: &str) -> Result<String> {
        let body = build_vision_request(
            Some(self.config.model.clone()),
            url,
            instruction,
            DESCRIBE_MAX_TOKENS,
        );
        let request = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key);

        let response = send_chat("OpenAI", request, &body).await?;
        first_choice_text(response)
    }
}

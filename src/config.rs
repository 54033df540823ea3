//! Configuration management for iconagent
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{IconAgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Backends the agent knows how to talk to
pub const VALID_PROVIDERS: [&str; 2] = ["openai", "azure_openai"];

/// Main configuration structure for iconagent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend selection and credentials
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Agent loop limits and execution policy
    #[serde(default)]
    pub agent: AgentConfig,
    /// Capability settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Provider configuration
///
/// Both backends may be configured at once; `primary` picks the one used
/// for the whole process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend to use ("openai" or "azure_openai")
    #[serde(default = "default_primary")]
    pub primary: String,

    /// OpenAI configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Azure OpenAI configuration
    #[serde(default)]
    pub azure_openai: AzureOpenAiConfig,
}

fn default_primary() -> String {
    "openai".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            openai: OpenAiConfig::default(),
            azure_openai: AzureOpenAiConfig::default(),
        }
    }
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Model identifier
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API key, usually supplied through `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (useful for tests and OpenAI-compatible gateways)
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: default_openai_model(),
            api_key: None,
            api_base: default_openai_api_base(),
        }
    }
}

/// Azure OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Deployment name of the chat model
    #[serde(default)]
    pub deployment: Option<String>,

    /// REST API version query parameter
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

fn default_azure_api_version() -> String {
    "2024-06-01".to_string()
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_azure_api_version(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model turns before the run fails
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Number of backend retries permitted over the whole run
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Deadline for the entire run (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Sampling and tool-choice policy sent with every request
    #[serde(default)]
    pub policy: ExecutionPolicy,
}

fn default_max_turns() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    180
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout(),
            policy: ExecutionPolicy::default(),
        }
    }
}

/// Options forwarded to the backend on each completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Caps the length of each model reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature in [0, 1]; lower is more deterministic
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Whether the model may, must not, or must call tools
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub tool_choice: ToolChoiceMode,
}

fn default_max_output_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            tool_choice: ToolChoiceMode::default(),
        }
    }
}

/// Tool-choice policy
///
/// In YAML this is written as `auto`, `none`, or `{ forced: tool_name }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    /// The model decides whether to call tools
    #[default]
    Auto,
    /// The model must answer without calling tools
    None,
    /// The model must call the named tool
    Forced(String),
}

impl FromStr for ToolChoiceMode {
    type Err = IconAgentError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "auto" => Ok(ToolChoiceMode::Auto),
            "none" => Ok(ToolChoiceMode::None),
            _ => match trimmed.split_once(':') {
                Some((kind, name)) if kind.eq_ignore_ascii_case("forced") && !name.is_empty() => {
                    Ok(ToolChoiceMode::Forced(name.trim().to_string()))
                }
                _ => Err(IconAgentError::Config(format!(
                    "Invalid tool choice '{}'. Expected auto, none or forced:<tool>",
                    s
                ))),
            },
        }
    }
}

impl fmt::Display for ToolChoiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolChoiceMode::Auto => write!(f, "auto"),
            ToolChoiceMode::None => write!(f, "none"),
            ToolChoiceMode::Forced(name) => write!(f, "forced:{}", name),
        }
    }
}

/// Capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum size of a single tool result fed back to the model (bytes)
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,

    /// Maximum number of tool calls from one turn running at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-call timeout applied by the dispatcher (seconds)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,

    /// HTTP timeout used by the URL validator (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// Allow the URL validator to reach localhost and private addresses
    #[serde(default)]
    pub allow_private_hosts: bool,

    /// Image search settings
    #[serde(default)]
    pub search: SearchConfig,
}

fn default_max_output() -> usize {
    65_536
}

fn default_max_concurrent() -> usize {
    4
}

fn default_call_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    15
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_output_size: default_max_output(),
            max_concurrent: default_max_concurrent(),
            call_timeout_seconds: default_call_timeout(),
            fetch_timeout_seconds: default_fetch_timeout(),
            allow_private_hosts: false,
            search: SearchConfig::default(),
        }
    }
}

/// Image web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Image search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Subscription key; the search capability is only registered when set
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum number of candidate URLs returned to the model
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

fn default_search_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/images/search".to_string()
}

fn default_search_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            max_results: default_search_max_results(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged, since credentials usually come from the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if a
    /// CLI override is malformed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli)?;

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IconAgentError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| IconAgentError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Apply environment variable overrides
    pub fn apply_env_vars(&mut self) {
        if let Ok(primary) = std::env::var("ICONAGENT_PROVIDER") {
            self.provider.primary = primary;
        }

        // OpenAI
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.provider.openai.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL_ID") {
            self.provider.openai.model = model;
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.provider.openai.api_base = base;
        }

        // Azure OpenAI
        if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            self.provider.azure_openai.endpoint = Some(endpoint);
        }
        if let Ok(key) = std::env::var("AZURE_OPENAI_API_KEY") {
            self.provider.azure_openai.api_key = Some(key);
        }
        if let Ok(deployment) = std::env::var("AZURE_OPENAI_MODEL_ID") {
            self.provider.azure_openai.deployment = Some(deployment);
        }
        if let Ok(version) = std::env::var("AZURE_OPENAI_API_VERSION") {
            self.provider.azure_openai.api_version = version;
        }

        // Agent
        if let Ok(max_turns) = std::env::var("ICONAGENT_MAX_TURNS") {
            if let Ok(value) = max_turns.parse() {
                self.agent.max_turns = value;
            } else {
                tracing::warn!("Invalid ICONAGENT_MAX_TURNS: {}", max_turns);
            }
        }

        if let Ok(retries) = std::env::var("ICONAGENT_MAX_RETRIES") {
            if let Ok(value) = retries.parse() {
                self.agent.max_retries = value;
            } else {
                tracing::warn!("Invalid ICONAGENT_MAX_RETRIES: {}", retries);
            }
        }

        if let Ok(timeout) = std::env::var("ICONAGENT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.agent.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid ICONAGENT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(temperature) = std::env::var("ICONAGENT_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                self.agent.policy.temperature = value;
            } else {
                tracing::warn!("Invalid ICONAGENT_TEMPERATURE: {}", temperature);
            }
        }

        if let Ok(max_tokens) = std::env::var("ICONAGENT_MAX_OUTPUT_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.agent.policy.max_output_tokens = value;
            } else {
                tracing::warn!("Invalid ICONAGENT_MAX_OUTPUT_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(choice) = std::env::var("ICONAGENT_TOOL_CHOICE") {
            match choice.parse::<ToolChoiceMode>() {
                Ok(mode) => self.agent.policy.tool_choice = mode,
                Err(e) => tracing::warn!("Ignoring ICONAGENT_TOOL_CHOICE: {}", e),
            }
        }

        // Search
        if let Ok(key) = std::env::var("BING_SEARCH_API_KEY") {
            self.tools.search.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("BING_SEARCH_ENDPOINT") {
            self.tools.search.endpoint = endpoint;
        }
    }

    /// Apply command line overrides, which win over file and environment
    pub fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) -> Result<()> {
        if let Some(provider) = &cli.provider {
            self.provider.primary = provider.clone();
        }
        if let Some(max_turns) = cli.max_turns {
            self.agent.max_turns = max_turns;
        }
        if let Some(max_retries) = cli.max_retries {
            self.agent.max_retries = max_retries;
        }
        if let Some(temperature) = cli.temperature {
            self.agent.policy.temperature = temperature;
        }
        if let Some(choice) = &cli.tool_choice {
            self.agent.policy.tool_choice = choice.parse()?;
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` for out-of-range values and `MissingCredentials`
    /// when the selected backend has no credentials
    pub fn validate(&self) -> Result<()> {
        if !VALID_PROVIDERS.contains(&self.provider.primary.as_str()) {
            return Err(IconAgentError::Config(format!(
                "Invalid provider: {}. Must be one of: {}",
                self.provider.primary,
                VALID_PROVIDERS.join(", ")
            ))
            .into());
        }

        match self.provider.primary.as_str() {
            "openai" => {
                if is_blank(&self.provider.openai.api_key) {
                    return Err(IconAgentError::MissingCredentials(
                        "openai (set OPENAI_API_KEY)".to_string(),
                    )
                    .into());
                }
            }
            _ => {
                let azure = &self.provider.azure_openai;
                if is_blank(&azure.endpoint)
                    || is_blank(&azure.api_key)
                    || is_blank(&azure.deployment)
                {
                    return Err(IconAgentError::MissingCredentials(
                        "azure_openai (set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and AZURE_OPENAI_MODEL_ID)"
                            .to_string(),
                    )
                    .into());
                }
            }
        }

        if self.agent.max_turns == 0 {
            return Err(
                IconAgentError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_turns > 1000 {
            return Err(IconAgentError::Config(
                "max_turns must be less than or equal to 1000".to_string(),
            )
            .into());
        }

        if self.agent.timeout_seconds == 0 {
            return Err(IconAgentError::Config(
                "timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let temperature = self.agent.policy.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(IconAgentError::Config(format!(
                "policy.temperature must be between 0.0 and 1.0, got {}",
                temperature
            ))
            .into());
        }

        if self.agent.policy.max_output_tokens == 0 {
            return Err(IconAgentError::Config(
                "policy.max_output_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tools.max_output_size == 0 {
            return Err(IconAgentError::Config(
                "tools.max_output_size must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tools.max_concurrent == 0 {
            return Err(IconAgentError::Config(
                "tools.max_concurrent must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tools.call_timeout_seconds == 0 {
            return Err(IconAgentError::Config(
                "tools.call_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tools.fetch_timeout_seconds == 0 {
            return Err(IconAgentError::Config(
                "tools.fetch_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

//! Provider module for iconagent
//!
//! This module contains the completion backend abstraction and the OpenAI
//! and Azure OpenAI implementations, which share one wire format.

pub mod azure;
pub mod base;
pub mod openai;
mod openai_compat;

pub use azure::AzureOpenAiProvider;
pub use base::{CompletionResponse, Provider, TokenUsage};
pub use openai::OpenAiProvider;

use crate::config::{ProviderConfig, VALID_PROVIDERS};
use crate::error::{IconAgentError, Result};
use std::sync::Arc;

/// Create the backend for this process
///
/// Selection happens once, from `config.primary` unless `provider_override`
/// names a backend explicitly.
///
/// # Arguments
///
/// * `config` - Full provider configuration containing all backend settings
/// * `provider_override` - Optional backend name ("openai" or "azure_openai")
///
/// # Errors
///
/// Returns `Config` for an unknown backend name and `MissingCredentials`
/// when the selected backend is not fully configured
///
/// # Examples
///
/// ```
/// use iconagent::config::ProviderConfig;
/// use iconagent::providers::create_provider;
///
/// let mut config = ProviderConfig::default();
/// config.openai.api_key = Some("sk-test".to_string());
///
/// let provider = create_provider(&config, None).unwrap();
/// assert_eq!(provider.name(), "openai");
/// ```
pub fn create_provider(
    config: &ProviderConfig,
    provider_override: Option<&str>,
) -> Result<Arc<dyn Provider>> {
    let provider_type = provider_override.unwrap_or(config.primary.as_str());

    tracing::debug!("Creating provider: {}", provider_type);

    match provider_type {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.openai.clone())?)),
        "azure_openai" => Ok(Arc::new(AzureOpenAiProvider::new(
            config.azure_openai.clone(),
        )?)),
        _ => Err(IconAgentError::Config(format!(
            "Unknown provider type: {}. Must be one of: {}",
            provider_type,
            VALID_PROVIDERS.join(", ")
        ))
        .into()),
    }
}

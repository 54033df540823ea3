//! Capability registry builder
//!
//! Assembles the registry the logo agent runs with. The URL validator and
//! image describer are always present; image search is only registered when
//! a search API key is configured.

use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::providers::Provider;
use crate::tools::{ImageDescriberTool, ImageSearchTool, ToolRegistry, UrlValidatorTool};

/// Builder for the logo agent's capability registry
///
/// # Examples
///
/// ```
/// use iconagent::config::{ProviderConfig, ToolsConfig};
/// use iconagent::providers::create_provider;
/// use iconagent::tools::registry_builder::ToolRegistryBuilder;
///
/// let mut providers = ProviderConfig::default();
/// providers.openai.api_key = Some("sk-test".to_string());
/// let provider = create_provider(&providers, None).unwrap();
///
/// let registry = ToolRegistryBuilder::new(provider)
///     .with_tools_config(ToolsConfig::default())
///     .build()
///     .unwrap();
/// assert_eq!(registry.names(), vec!["url_validator", "describe_image_at_url"]);
/// ```
pub struct ToolRegistryBuilder {
    provider: Arc<dyn Provider>,
    tools_config: ToolsConfig,
}

impl ToolRegistryBuilder {
    /// Create a builder whose image describer uses `provider`
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            tools_config: ToolsConfig::default(),
        }
    }

    /// Set the tools configuration
    pub fn with_tools_config(mut self, config: ToolsConfig) -> Self {
        self.tools_config = config;
        self
    }

    /// Build the registry
    ///
    /// # Errors
    ///
    /// Returns error if a capability fails to register
    pub fn build(self) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        registry.register(Arc::new(UrlValidatorTool::new(&self.tools_config)))?;
        registry.register(Arc::new(ImageDescriberTool::new(Arc::clone(
            &self.provider,
        ))))?;

        match ImageSearchTool::from_config(&self.tools_config.search) {
            Some(search) => registry.register(Arc::new(search))?,
            None => tracing::info!(
                "No image search API key configured; search_for_brand_logo is not available"
            ),
        }

        tracing::debug!(tools = ?registry.names(), "Capability registry built");
        Ok(registry)
    }
}

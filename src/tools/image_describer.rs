//! Image describer capability
//!
//! Asks the selected backend's vision support what an image shows, so the
//! model can confirm a candidate really is the brand's logo.

use crate::error::{IconAgentError, Result};
use crate::providers::Provider;
use crate::tools::{OutputKind, ParamKind, ParamSchema, Tool, ToolExecutor, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Capability name advertised to the model
pub const IMAGE_DESCRIBER_NAME: &str = "describe_image_at_url";

const DESCRIBE_INSTRUCTION: &str = "Describe this image in one or two sentences. \
Mention any visible brand names, wordmarks or symbols, and whether it looks like a logo.";

/// Describes the image at a URL using the provider's vision support
pub struct ImageDescriberTool {
    provider: Arc<dyn Provider>,
}

impl ImageDescriberTool {
    /// Create a describer backed by `provider`
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ToolExecutor for ImageDescriberTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            IMAGE_DESCRIBER_NAME,
            "Describes the image found at a URL, including any visible brand names.",
            vec![ParamSchema::required(
                "url",
                ParamKind::String,
                "Absolute http(s) URL of the image to describe",
            )],
            OutputKind::Text,
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let url = args["url"].as_str().unwrap_or_default().trim();
        if url.is_empty() {
            return Ok(ToolResult::error("url must not be empty"));
        }

        let description = self
            .provider
            .describe_image(url, DESCRIBE_INSTRUCTION)
            .await
            .map_err(|e| IconAgentError::ToolExecution {
                tool: IMAGE_DESCRIBER_NAME.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(url = %url, provider = self.provider.name(), "Image described");
        Ok(ToolResult::success(description))
    }
}

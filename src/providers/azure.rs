//! Azure OpenAI provider implementation for iconagent
//!
//! Azure serves the OpenAI chat-completions format per deployment:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//! authenticated with an `api-key` header. The deployment selects the model,
//! so no model field is sent.

use crate::agent::Turn;
use crate::config::{AzureOpenAiConfig, ExecutionPolicy};
use crate::error::{IconAgentError, Result};
use crate::providers::openai::DESCRIBE_MAX_TOKENS;
use crate::providers::openai_compat::{
    build_chat_request, build_vision_request, convert_response, first_choice_text, send_chat,
};
use crate::providers::{CompletionResponse, Provider};
use crate::tools::Tool;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// Azure OpenAI chat-completions provider
pub struct AzureOpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    /// Create a new Azure OpenAI provider
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` unless endpoint, key and deployment are
    /// all set, or `Config` if the endpoint is not a valid URL
    pub fn new(config: AzureOpenAiConfig) -> Result<Self> {
        let required = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (endpoint, api_key, deployment) = match (
            required(&config.endpoint),
            required(&config.api_key),
            required(&config.deployment),
        ) {
            (Some(endpoint), Some(api_key), Some(deployment)) => (endpoint, api_key, deployment),
            _ => {
                return Err(IconAgentError::MissingCredentials(
                    "azure_openai (set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and AZURE_OPENAI_MODEL_ID)"
                        .to_string(),
                )
                .into())
            }
        };

        url::Url::parse(&endpoint).map_err(|e| {
            IconAgentError::Config(format!("Invalid Azure endpoint '{}': {}", endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("iconagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                IconAgentError::BackendUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Azure OpenAI provider: endpoint={}, deployment={}, api_version={}",
            endpoint,
            deployment,
            config.api_version
        );

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment,
            api_version: config.api_version,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }

    fn request(&self) -> RequestBuilder {
        self.client
            .post(self.completions_url())
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
    }
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    fn model(&self) -> String {
        self.deployment.clone()
    }

    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[Tool],
        policy: &ExecutionPolicy,
    ) -> Result<CompletionResponse> {
        let body = build_chat_request(None, turns, tools, policy);
        let response = send_chat("Azure OpenAI", self.request(), &body).await?;
        convert_response(response)
    }

    async fn describe_image(&self, url: &str, instruction: &str) -> Result<String> {
        let body = build_vision_request(None, url, instruction, DESCRIBE_MAX_TOKENS);
        let response = send_chat("Azure OpenAI", self.request(), &body).await?;
        first_choice_text(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(endpoint: &str) -> AzureOpenAiConfig {
        AzureOpenAiConfig {
            endpoint: Some(endpoint.to_string()),
            api_key: Some("azure-key".to_string()),
            deployment: Some("gpt4o".to_string()),
            api_version: "2024-06-01".to_string(),
        }
    }

    #[test]
    fn test_new_requires_all_credentials() {
        let mut config = config_for("https://r.openai.azure.com");
        config.deployment = None;
        let err = AzureOpenAiProvider::new(config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<IconAgentError>(),
            Some(IconAgentError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let err = AzureOpenAiProvider::new(config_for("not a url"))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<IconAgentError>(),
            Some(IconAgentError::Config(_))
        ));
    }

    #[test]
    fn test_identity_reports_deployment() {
        let provider = AzureOpenAiProvider::new(config_for("https://r.openai.azure.com/")).unwrap();
        assert_eq!(provider.name(), "azure_openai");
        assert_eq!(provider.model(), "gpt4o");
        assert_eq!(
            provider.completions_url(),
            "https://r.openai.azure.com/openai/deployments/gpt4o/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_complete_uses_deployment_url_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt4o/chat/completions"))
            .and(query_param("api-version", "2024-06-01"))
            .and(header("api-key", "azure-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "<img src=\"https://a.example/l.png\">"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AzureOpenAiProvider::new(config_for(&server.uri())).unwrap();
        let completion = provider
            .complete(
                &[Turn::Goal("find".to_string())],
                &[],
                &ExecutionPolicy::default(),
            )
            .await
            .unwrap();
        assert!(completion.turn.text_or_empty().starts_with("<img"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&server)
            .await;

        let provider = AzureOpenAiProvider::new(config_for(&server.uri())).unwrap();
        let err = provider
            .complete(
                &[Turn::Goal("find".to_string())],
                &[],
                &ExecutionPolicy::default(),
            )
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<IconAgentError>()
            .map(IconAgentError::is_backend_error)
            .unwrap_or(false));
    }
}

//! Brand logo image search capability
//!
//! Queries the Bing Image Search v7 API for `<query> logo` and returns the
//! candidate image URLs as a JSON array of strings.

use crate::config::SearchConfig;
use crate::error::{IconAgentError, Result};
use crate::tools::{OutputKind, ParamKind, ParamSchema, Tool, ToolExecutor, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Capability name advertised to the model
pub const IMAGE_SEARCH_NAME: &str = "search_for_brand_logo";

/// Bing image search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    #[serde(default)]
    content_url: Option<String>,
}

/// Searches the web for brand logo images
pub struct ImageSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

impl ImageSearchTool {
    /// Create the search capability, or `None` when no API key is configured
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("iconagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            max_results: config.max_results.max(1),
        })
    }

    /// Run one search and return up to `max_results` image URLs
    ///
    /// # Errors
    ///
    /// Returns `ToolExecution` if the request fails, the service rejects it,
    /// or the body cannot be decoded
    pub async fn search(&self, query: &str) -> Result<Vec<String>> {
        let failed = |message: String| IconAgentError::ToolExecution {
            tool: IMAGE_SEARCH_NAME.to_string(),
            message,
        };

        let search_terms = format!("{} logo", query.trim());
        let count = self.max_results.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", search_terms.as_str()), ("count", count.as_str())])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| failed(format!("search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("search returned {}: {}", status, body)).into());
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("failed to parse search response: {}", e)))?;

        let urls: Vec<String> = body
            .value
            .into_iter()
            .filter_map(|hit| hit.content_url)
            .filter(|url| !url.is_empty())
            .take(self.max_results)
            .collect();

        tracing::debug!(query = %search_terms, results = urls.len(), "Image search finished");
        Ok(urls)
    }
}

#[async_trait]
impl ToolExecutor for ImageSearchTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            IMAGE_SEARCH_NAME,
            "Searches the web for logo images of a brand. Returns a JSON array of candidate image URLs.",
            vec![ParamSchema::required(
                "query",
                ParamKind::String,
                "Brand or organization name",
            )],
            OutputKind::UrlList,
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let query = args["query"].as_str().unwrap_or_default();
        if query.trim().is_empty() {
            return Ok(ToolResult::error("query must not be empty"));
        }

        let urls = self.search(query).await?;
        Ok(ToolResult::success(serde_json::to_string(&urls)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_config(endpoint: String) -> SearchConfig {
        SearchConfig {
            endpoint,
            api_key: Some("bing-key".to_string()),
            max_results: 2,
        }
    }

    #[test]
    fn test_not_created_without_api_key() {
        assert!(ImageSearchTool::from_config(&SearchConfig::default()).is_none());
        let blank = SearchConfig {
            api_key: Some("  ".to_string()),
            ..SearchConfig::default()
        };
        assert!(ImageSearchTool::from_config(&blank).is_none());
    }

    #[tokio::test]
    async fn test_search_returns_content_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7.0/images/search"))
            .and(query_param("q", "Acme Corp logo"))
            .and(query_param("count", "2"))
            .and(header("Ocp-Apim-Subscription-Key", "bing-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"contentUrl": "https://acme.example/logo.png", "name": "Acme"},
                    {"name": "no url"},
                    {"contentUrl": "https://cdn.example/acme.svg"},
                    {"contentUrl": "https://other.example/third.png"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool =
            ImageSearchTool::from_config(&search_config(format!("{}/v7.0/images/search", server.uri())))
                .unwrap();
        let result = tool.execute(json!({"query": "Acme Corp"})).await.unwrap();

        assert!(result.success);
        let urls: Vec<String> = serde_json::from_str(&result.output).unwrap();
        assert_eq!(
            urls,
            vec!["https://acme.example/logo.png", "https://cdn.example/acme.svg"]
        );
    }

    #[tokio::test]
    async fn test_search_error_status_is_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let tool = ImageSearchTool::from_config(&search_config(server.uri())).unwrap();
        let err = tool.search("Acme").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IconAgentError>(),
            Some(IconAgentError::ToolExecution { message, .. }) if message.contains("401")
        ));
    }
}

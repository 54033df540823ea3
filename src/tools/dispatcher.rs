//! Tool-call dispatcher
//!
//! Resolves each requested call against the registry, validates its
//! arguments, runs it, and turns every failure into a tool-error result the
//! model can read. Calls from one turn run concurrently but results come
//! back in request order.

use crate::agent::{ToolCallRequest, ToolErrorKind, ToolResultTurn};
use crate::config::ToolsConfig;
use crate::error::IconAgentError;
use crate::tools::ToolRegistry;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Executes the tool calls of one model turn
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    max_concurrent: usize,
    call_timeout: Duration,
    max_output_size: usize,
}

impl ToolDispatcher {
    /// Create a dispatcher over `registry` using the limits in `config`
    pub fn new(registry: Arc<ToolRegistry>, config: &ToolsConfig) -> Self {
        Self {
            registry,
            max_concurrent: config.max_concurrent.max(1),
            call_timeout: Duration::from_secs(config.call_timeout_seconds),
            max_output_size: config.max_output_size,
        }
    }

    /// The registry calls are resolved against
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch of tool calls
    ///
    /// Returns exactly one result per request, in request order. Failures
    /// never propagate; they become error results tagged with the call id.
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::agent::{ToolCallRequest, ToolErrorKind};
    /// use iconagent::config::ToolsConfig;
    /// use iconagent::tools::{ToolDispatcher, ToolRegistry};
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::new()), &ToolsConfig::default());
    /// let results = dispatcher
    ///     .execute(&[ToolCallRequest::new("call_1", "draw_logo", "{}")])
    ///     .await;
    /// assert_eq!(results[0].error_kind(), Some(ToolErrorKind::UnknownCapability));
    /// # });
    /// ```
    pub async fn execute(&self, requests: &[ToolCallRequest]) -> Vec<ToolResultTurn> {
        if requests.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let start = Instant::now();

        info!(
            dispatch.event = "start",
            dispatch.call_count = requests.len(),
            dispatch.max_concurrent = self.max_concurrent,
            "Dispatching tool calls"
        );

        let results = join_all(
            requests
                .iter()
                .map(|request| self.execute_one(request, Arc::clone(&semaphore))),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_error()).count();
        info!(
            dispatch.event = "complete",
            dispatch.call_count = results.len(),
            dispatch.failed = failed,
            dispatch.duration_ms = start.elapsed().as_millis() as u64,
            "Tool calls finished"
        );

        results
    }

    async fn execute_one(
        &self,
        request: &ToolCallRequest,
        semaphore: Arc<Semaphore>,
    ) -> ToolResultTurn {
        let failure = |kind: ToolErrorKind, message: String| {
            warn!(
                tool.name = %request.name,
                tool.call_id = %request.id,
                tool.error_kind = %kind,
                "{}",
                message
            );
            ToolResultTurn::error(&request.name, &request.id, kind, message)
        };

        let (definition, executor) = match self.registry.lookup(&request.name) {
            Ok(found) => found,
            Err(e) => return failure(ToolErrorKind::UnknownCapability, e.to_string()),
        };

        let args = match parse_arguments(&request.arguments) {
            Ok(args) => args,
            Err(message) => {
                let err = IconAgentError::ArgumentValidation {
                    tool: request.name.clone(),
                    message,
                };
                return failure(ToolErrorKind::ArgumentValidation, err.to_string());
            }
        };

        if let Err(e) = definition.validate_args(&args) {
            return failure(ToolErrorKind::ArgumentValidation, e.to_string());
        }

        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return failure(
                    ToolErrorKind::ToolExecution,
                    format!("Failed to acquire dispatch permit: {}", e),
                )
            }
        };

        debug!(
            tool.name = %request.name,
            tool.call_id = %request.id,
            "Invoking capability"
        );

        let outcome = tokio::time::timeout(self.call_timeout, executor.execute(args)).await;

        match outcome {
            Err(_) => failure(
                ToolErrorKind::ToolExecution,
                IconAgentError::ToolExecution {
                    tool: request.name.clone(),
                    message: format!("timed out after {}s", self.call_timeout.as_secs()),
                }
                .to_string(),
            ),
            Ok(Err(e)) => failure(ToolErrorKind::ToolExecution, e.to_string()),
            Ok(Ok(result)) if !result.success => failure(
                ToolErrorKind::ToolExecution,
                result
                    .error
                    .unwrap_or_else(|| format!("{} failed without a message", request.name)),
            ),
            Ok(Ok(result)) => {
                let result = result.truncate_if_needed(self.max_output_size);
                debug!(
                    tool.name = %request.name,
                    tool.call_id = %request.id,
                    tool.output_len = result.output.len(),
                    tool.truncated = result.truncated,
                    "Capability returned"
                );
                ToolResultTurn::success(&request.name, &request.id, result.output)
            }
        }
    }
}

/// Parse the raw argument string; an empty string means no arguments
fn parse_arguments(raw: &str) -> std::result::Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::tools::{OutputKind, ParamKind, ParamSchema, Tool, ToolExecutor, ToolResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper;

    #[async_trait]
    impl ToolExecutor for Upper {
        fn tool_definition(&self) -> Tool {
            Tool::new(
                "upper",
                "Uppercases text",
                vec![ParamSchema::required("text", ParamKind::String, "Text")],
                OutputKind::Text,
            )
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            let text = args["text"].as_str().unwrap_or_default();
            Ok(ToolResult::success(text.to_uppercase()))
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolExecutor for Failing {
        fn tool_definition(&self) -> Tool {
            Tool::new("failing", "Always fails", vec![], OutputKind::Text)
        }

        async fn execute(&self, _args: Value) -> Result<ToolResult> {
            Err(anyhow::anyhow!("upstream exploded"))
        }
    }

    struct Sleepy {
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolExecutor for Sleepy {
        fn tool_definition(&self) -> Tool {
            Tool::new(
                "sleepy",
                "Sleeps",
                vec![ParamSchema::required("label", ParamKind::String, "Label")],
                OutputKind::Text,
            )
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ToolResult::success(
                args["label"].as_str().unwrap_or_default().to_string(),
            ))
        }
    }

    /// Sleeps for the requested number of milliseconds
    struct Delayed;

    #[async_trait]
    impl ToolExecutor for Delayed {
        fn tool_definition(&self) -> Tool {
            Tool::new(
                "delayed",
                "Sleeps, then echoes the delay",
                vec![ParamSchema::required("ms", ParamKind::Integer, "Delay")],
                OutputKind::Text,
            )
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            let ms = args["ms"].as_u64().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ToolResult::success(ms.to_string()))
        }
    }

    fn dispatcher_with(tools: Vec<Arc<dyn ToolExecutor>>, config: ToolsConfig) -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        ToolDispatcher::new(Arc::new(registry), &config)
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let dispatcher = dispatcher_with(vec![Arc::new(Upper)], ToolsConfig::default());
        let requests = vec![
            ToolCallRequest::new("c1", "upper", r#"{"text":"a"}"#),
            ToolCallRequest::new("c2", "upper", r#"{"text":"b"}"#),
        ];

        let results = dispatcher.execute(&requests).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], ToolResultTurn::success("upper", "c1", "A"));
        assert_eq!(results[1], ToolResultTurn::success("upper", "c2", "B"));
    }

    #[tokio::test]
    async fn test_slow_first_call_keeps_its_position() {
        let dispatcher = dispatcher_with(vec![Arc::new(Delayed)], ToolsConfig::default());
        let requests = vec![
            ToolCallRequest::new("c1", "delayed", r#"{"ms":80}"#),
            ToolCallRequest::new("c2", "delayed", r#"{"ms":5}"#),
        ];

        let results = dispatcher.execute(&requests).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call_id, "c1");
        assert_eq!(results[0].to_message(), "80");
        assert_eq!(results[1].call_id, "c2");
        assert_eq!(results[1].to_message(), "5");
    }

    #[tokio::test]
    async fn test_unknown_capability_becomes_error_result() {
        let dispatcher = dispatcher_with(vec![Arc::new(Upper)], ToolsConfig::default());
        let results = dispatcher
            .execute(&[ToolCallRequest::new("c1", "draw_logo", "{}")])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].call_id, "c1");
        assert_eq!(
            results[0].error_kind(),
            Some(ToolErrorKind::UnknownCapability)
        );
        assert!(results[0].to_message().contains("draw_logo"));
    }

    #[tokio::test]
    async fn test_bad_arguments_become_validation_errors() {
        let dispatcher = dispatcher_with(vec![Arc::new(Upper)], ToolsConfig::default());
        let results = dispatcher
            .execute(&[
                ToolCallRequest::new("c1", "upper", "{not json"),
                ToolCallRequest::new("c2", "upper", r#"{"text": 5}"#),
                ToolCallRequest::new("c3", "upper", ""),
            ])
            .await;

        assert!(results
            .iter()
            .all(|r| r.error_kind() == Some(ToolErrorKind::ArgumentValidation)));
    }

    #[tokio::test]
    async fn test_execution_failure_is_reported() {
        let dispatcher = dispatcher_with(vec![Arc::new(Failing)], ToolsConfig::default());
        let results = dispatcher
            .execute(&[ToolCallRequest::new("c1", "failing", "{}")])
            .await;
        assert_eq!(results[0].error_kind(), Some(ToolErrorKind::ToolExecution));
        assert!(results[0].to_message().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let config = ToolsConfig {
            call_timeout_seconds: 0,
            ..ToolsConfig::default()
        };
        let sleepy = Sleepy {
            delay: Duration::from_millis(200),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        };
        let dispatcher = dispatcher_with(vec![Arc::new(sleepy)], config);
        let results = dispatcher
            .execute(&[ToolCallRequest::new("c1", "sleepy", r#"{"label":"x"}"#)])
            .await;
        assert_eq!(results[0].error_kind(), Some(ToolErrorKind::ToolExecution));
        assert!(results[0].to_message().contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let sleepy = Sleepy {
            delay: Duration::from_millis(30),
            running: Arc::clone(&running),
            peak: Arc::clone(&peak),
        };
        let config = ToolsConfig {
            max_concurrent: 2,
            ..ToolsConfig::default()
        };
        let dispatcher = dispatcher_with(vec![Arc::new(sleepy)], config);

        let requests: Vec<_> = (0..5)
            .map(|i| ToolCallRequest::new(format!("c{}", i), "sleepy", format!(r#"{{"label":"{}"}}"#, i)))
            .collect();
        let results = dispatcher.execute(&requests).await;

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.to_message(), i.to_string());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let config = ToolsConfig {
            max_output_size: 4,
            ..ToolsConfig::default()
        };
        let dispatcher = dispatcher_with(vec![Arc::new(Upper)], config);
        let results = dispatcher
            .execute(&[ToolCallRequest::new("c1", "upper", r#"{"text":"abcdefgh"}"#)])
            .await;
        assert!(results[0].to_message().starts_with("ABCD"));
        assert!(results[0].to_message().contains("truncated"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dispatcher = dispatcher_with(vec![], ToolsConfig::default());
        assert!(dispatcher.execute(&[]).await.is_empty());
    }
}

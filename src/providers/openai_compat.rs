//! OpenAI chat-completions wire format shared by the OpenAI and Azure backends
//!
//! Both backends speak the same request and response bodies and differ only
//! in URL layout and authentication header, so the translation between
//! transcript turns and wire messages lives here.

use crate::agent::{ModelTurn, ToolCallRequest, Turn};
use crate::config::{ExecutionPolicy, ToolChoiceMode};
use crate::error::{IconAgentError, Result};
use crate::providers::{CompletionResponse, TokenUsage};
use crate::tools::Tool;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Message in the request transcript
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Plain text or multi-part (text + image) content
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

/// Tool advertised to the model
#[derive(Debug, Serialize)]
pub(crate) struct ChatTool {
    pub r#type: &'static str,
    pub function: ChatFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tool call in OpenAI format
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_tool_type")]
    pub r#type: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// Response body from `/chat/completions`
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
}

/// Build the request body for one agent turn
pub(crate) fn build_chat_request(
    model: Option<String>,
    turns: &[Turn],
    tools: &[Tool],
    policy: &ExecutionPolicy,
) -> ChatRequest {
    let tools = convert_tools(tools);
    let tool_choice = convert_tool_choice(&policy.tool_choice, !tools.is_empty());
    ChatRequest {
        model,
        messages: convert_turns(turns),
        tools,
        tool_choice,
        max_tokens: policy.max_output_tokens,
        temperature: policy.temperature,
    }
}

/// Build a single-message vision request asking about one image
pub(crate) fn build_vision_request(
    model: Option<String>,
    image_url: &str,
    instruction: &str,
    max_tokens: u32,
) -> ChatRequest {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: Some(MessageContent::Parts(vec![
                ContentPart::Text {
                    text: instruction.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
            ])),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }],
        tools: Vec::new(),
        tool_choice: None,
        max_tokens,
        temperature: 0.0,
    }
}

/// Convert transcript turns into wire messages, preserving order
pub(crate) fn convert_turns(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::Goal(goal) => ChatMessage {
                role: "user",
                content: Some(MessageContent::Text(goal.clone())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            Turn::Model(model_turn) => ChatMessage {
                role: "assistant",
                content: model_turn.text.clone().map(MessageContent::Text),
                tool_calls: model_turn
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        r#type: default_tool_type(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            },
            Turn::ToolResult(result) => ChatMessage {
                role: "tool",
                content: Some(MessageContent::Text(result.to_message())),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.call_id.clone()),
            },
        })
        .collect()
}

/// Convert capability definitions into wire tools
pub(crate) fn convert_tools(tools: &[Tool]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|tool| ChatTool {
            r#type: "function",
            function: ChatFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.json_schema(),
            },
        })
        .collect()
}

/// Convert the tool-choice mode; omitted entirely when no tools are sent
pub(crate) fn convert_tool_choice(
    mode: &ToolChoiceMode,
    has_tools: bool,
) -> Option<serde_json::Value> {
    if !has_tools {
        return None;
    }
    Some(match mode {
        ToolChoiceMode::Auto => serde_json::json!("auto"),
        ToolChoiceMode::None => serde_json::json!("none"),
        ToolChoiceMode::Forced(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    })
}

/// Normalize a response body into a completion
///
/// # Errors
///
/// Returns `BackendResponse` when there is no choice, or the first choice
/// carries neither text nor tool calls
/// Positional id `call_<n>` not yet used in this reply
fn synthesize_call_id(index: usize, seen: &HashSet<String>) -> String {
    let mut n = index;
    loop {
        let id = format!("call_{}", n);
        if !seen.contains(&id) {
            return id;
        }
        n += 1;
    }
}

pub(crate) fn convert_response(response: ChatResponse) -> Result<CompletionResponse> {
    let usage = response
        .usage
        .as_ref()
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

    let choice = response.choices.into_iter().next().ok_or_else(|| {
        IconAgentError::BackendResponse("response contained no choices".to_string())
    })?;

    let text = choice
        .message
        .content
        .filter(|content| !content.trim().is_empty());

    let mut seen = HashSet::new();
    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, call)| {
            let id = if call.id.is_empty() || seen.contains(&call.id) {
                synthesize_call_id(index, &seen)
            } else {
                call.id
            };
            seen.insert(id.clone());
            let arguments = if call.function.arguments.trim().is_empty() {
                "{}".to_string()
            } else {
                call.function.arguments
            };
            ToolCallRequest::new(id, call.function.name, arguments)
        })
        .collect();

    if text.is_none() && tool_calls.is_empty() {
        return Err(IconAgentError::BackendResponse(format!(
            "reply had neither content nor tool calls (finish_reason={})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))
        .into());
    }

    let turn = ModelTurn { text, tool_calls };
    Ok(match usage {
        Some(usage) => CompletionResponse::with_usage(turn, usage),
        None => CompletionResponse::new(turn),
    })
}

/// Text of the first choice, for single-shot requests such as vision
pub(crate) fn first_choice_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            IconAgentError::BackendResponse("response contained no text".to_string()).into()
        })
}

/// Send a prepared request and decode the body
///
/// Transport failures, authentication failures, rate limiting and server
/// errors map to `BackendUnavailable`; other rejections and undecodable
/// bodies map to `BackendResponse`.
pub(crate) async fn send_chat(
    backend: &str,
    request: RequestBuilder,
    body: &ChatRequest,
) -> Result<ChatResponse> {
    tracing::debug!(
        "Sending {} request: {} messages, {} tools",
        backend,
        body.messages.len(),
        body.tools.len()
    );

    let response = request.json(body).send().await.map_err(|e| {
        tracing::error!("{} request failed: {}", backend, e);
        IconAgentError::BackendUnavailable(format!("{} request failed: {}", backend, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("{} returned error {}: {}", backend, status, error_text);
        return Err(classify_status(backend, status, &error_text).into());
    }

    response.json::<ChatResponse>().await.map_err(|e| {
        tracing::error!("Failed to parse {} response: {}", backend, e);
        IconAgentError::BackendResponse(format!("Failed to parse {} response: {}", backend, e))
            .into()
    })
}

fn classify_status(backend: &str, status: StatusCode, body: &str) -> IconAgentError {
    let message = format!("{} returned error {}: {}", backend, status, body);
    if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        IconAgentError::BackendUnavailable(message)
    } else {
        IconAgentError::BackendResponse(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ToolErrorKind, ToolResultTurn};
    use crate::tools::{OutputKind, ParamKind, ParamSchema};

    fn response_from(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_turns_preserves_order_and_roles() {
        let turns = vec![
            Turn::Goal("find logo".to_string()),
            Turn::Model(ModelTurn::with_tool_calls(vec![ToolCallRequest::new(
                "call_1",
                "url_validator",
                r#"{"url":"https://a.example/l.png"}"#,
            )])),
            Turn::ToolResult(ToolResultTurn::error(
                "url_validator",
                "call_1",
                ToolErrorKind::ToolExecution,
                "timeout",
            )),
        ];

        let messages = serde_json::to_value(convert_turns(&turns)).unwrap();
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "find logo");
        assert_eq!(messages[1]["role"], "assistant");
        assert!(messages[1].get("content").is_none());
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "url_validator");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(messages[2]["content"], "Error (ToolExecutionError): timeout");
    }

    #[test]
    fn test_tool_choice_mapping() {
        assert_eq!(convert_tool_choice(&ToolChoiceMode::Auto, true).unwrap(), "auto");
        assert_eq!(convert_tool_choice(&ToolChoiceMode::None, true).unwrap(), "none");
        let forced = convert_tool_choice(&ToolChoiceMode::Forced("x".to_string()), true).unwrap();
        assert_eq!(forced["function"]["name"], "x");
        assert!(convert_tool_choice(&ToolChoiceMode::Auto, false).is_none());
    }

    #[test]
    fn test_build_chat_request_carries_policy() {
        let tool = Tool::new(
            "url_validator",
            "Validate",
            vec![ParamSchema::required("url", ParamKind::String, "URL")],
            OutputKind::Verdict,
        );
        let policy = ExecutionPolicy {
            max_output_tokens: 321,
            temperature: 0.25,
            tool_choice: ToolChoiceMode::Auto,
        };
        let request = build_chat_request(
            Some("gpt-4o-mini".to_string()),
            &[Turn::Goal("g".to_string())],
            &[tool],
            &policy,
        );
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 321);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "url");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_vision_request_has_image_part() {
        let request = build_vision_request(None, "https://a.example/l.png", "Describe", 200);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("model").is_none());
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "https://a.example/l.png"
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_convert_response_text() {
        let response = response_from(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }));
        let completion = convert_response(response).unwrap();
        assert_eq!(completion.turn.text.as_deref(), Some("hello"));
        assert!(!completion.turn.has_tool_calls());
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_convert_response_tool_calls_get_unique_ids() {
        let response = response_from(serde_json::json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "", "type": "function", "function": {"name": "a", "arguments": ""}},
                {"id": "dup", "type": "function", "function": {"name": "b", "arguments": "{}"}},
                {"id": "dup", "type": "function", "function": {"name": "c", "arguments": "{}"}}
            ]}}]
        }));
        let completion = convert_response(response).unwrap();
        let calls = &completion.turn.tool_calls;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[1].id, "dup");
        assert_eq!(calls[2].id, "call_2");
        assert_eq!(
            calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_synthesized_ids_skip_ids_already_taken() {
        let response = response_from(serde_json::json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "a", "arguments": "{}"}},
                {"id": "", "type": "function", "function": {"name": "b", "arguments": "{}"}}
            ]}}]
        }));
        let completion = convert_response(response).unwrap();
        let ids: Vec<&str> = completion.turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_1", "call_2"]);
    }

    #[test]
    fn test_convert_response_empty_is_error() {
        let response = response_from(serde_json::json!({"choices": []}));
        let err = convert_response(response).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IconAgentError>(),
            Some(IconAgentError::BackendResponse(_))
        ));

        let blank = response_from(serde_json::json!({
            "choices": [{"message": {"content": "   "}, "finish_reason": "length"}]
        }));
        let err = convert_response(blank).unwrap_err();
        assert!(err.to_string().contains("finish_reason=length"));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status("openai", StatusCode::SERVICE_UNAVAILABLE, ""),
            IconAgentError::BackendUnavailable(_)
        ));
        assert!(matches!(
            classify_status("openai", StatusCode::UNAUTHORIZED, ""),
            IconAgentError::BackendUnavailable(_)
        ));
        assert!(matches!(
            classify_status("openai", StatusCode::BAD_REQUEST, "bad"),
            IconAgentError::BackendResponse(_)
        ));
    }
}

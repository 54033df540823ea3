use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Environment variables that would leak host settings into a test run
#[allow(dead_code)]
pub const ICONAGENT_ENV_VARS: [&str; 16] = [
    "ICONAGENT_PROVIDER",
    "OPENAI_API_KEY",
    "OPENAI_MODEL_ID",
    "OPENAI_API_BASE",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_MODEL_ID",
    "AZURE_OPENAI_API_VERSION",
    "ICONAGENT_MAX_TURNS",
    "ICONAGENT_MAX_RETRIES",
    "ICONAGENT_TIMEOUT_SECONDS",
    "ICONAGENT_TEMPERATURE",
    "ICONAGENT_MAX_OUTPUT_TOKENS",
    "ICONAGENT_TOOL_CHOICE",
    "BING_SEARCH_API_KEY",
    "BING_SEARCH_ENDPOINT",
];

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Chat-completions body whose reply is plain text
#[allow(dead_code)]
pub fn text_reply(text: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

/// Chat-completions body whose reply requests one tool call
#[allow(dead_code)]
pub fn tool_call_reply(id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

/// Mount chat-completions replies that are served once each, in order
#[allow(dead_code)]
pub async fn mount_chat_script(server: &MockServer, route: &str, replies: Vec<Value>) {
    for reply in replies {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

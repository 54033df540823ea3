//! Tools module for iconagent
//!
//! This module contains the capability contracts (typed input/output
//! schemas), the capability registry, the tool-call dispatcher, and the
//! concrete capabilities the logo agent uses.

pub mod dispatcher;
pub mod image_describer;
pub mod image_search;
pub mod registry_builder;
pub mod url_validator;

pub use dispatcher::ToolDispatcher;
pub use image_describer::ImageDescriberTool;
pub use image_search::ImageSearchTool;
pub use registry_builder::ToolRegistryBuilder;
pub use url_validator::UrlValidatorTool;

use crate::error::{IconAgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Type of a single tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// JSON string
    String,
    /// JSON number without fractional part
    Integer,
    /// Any JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON array of strings
    StringArray,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringArray => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringArray => write!(f, "array of strings"),
            other => write!(f, "{}", other.json_type()),
        }
    }
}

/// One named, typed input parameter of a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Parameter name as the model must send it
    pub name: String,
    /// Expected JSON type
    pub kind: ParamKind,
    /// Description shown to the model
    pub description: String,
    /// Whether the parameter must be present
    pub required: bool,
}

impl ParamSchema {
    /// A required parameter
    pub fn required(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    /// An optional parameter
    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        }
    }
}

/// Shape of what a capability returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Free-form natural language
    Text,
    /// A `valid` / `invalid: <reason>` verdict
    Verdict,
    /// A JSON array of URLs
    UrlList,
}

/// Tool definition structure
///
/// Declares a capability to the model: its name, what it does, its ordered
/// input parameters and the kind of output it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// Ordered input parameters
    pub params: Vec<ParamSchema>,
    /// Output shape
    pub output: OutputKind,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSchema>,
        output: OutputKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            output,
        }
    }

    /// JSON schema for the parameters, in OpenAI function-calling format
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::tools::{OutputKind, ParamKind, ParamSchema, Tool};
    ///
    /// let tool = Tool::new(
    ///     "url_validator",
    ///     "Checks a URL",
    ///     vec![ParamSchema::required("url", ParamKind::String, "URL to check")],
    ///     OutputKind::Verdict,
    /// );
    /// let schema = tool.json_schema();
    /// assert_eq!(schema["properties"]["url"]["type"], "string");
    /// assert_eq!(schema["required"][0], "url");
    /// ```
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), Value::from(param.kind.json_type()));
            prop.insert("description".to_string(), Value::from(param.description.clone()));
            if param.kind == ParamKind::StringArray {
                prop.insert("items".to_string(), serde_json::json!({"type": "string"}));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Check a definition before it is registered
    ///
    /// Names follow the function-name rules of OpenAI-compatible backends and
    /// parameter names must be unique.
    pub fn check_definition(&self) -> std::result::Result<(), IconAgentError> {
        let valid_name = !self.name.is_empty()
            && self.name.len() <= 64
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(IconAgentError::Config(format!(
                "Invalid capability name '{}': use 1-64 characters from [a-zA-Z0-9_-]",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for param in &self.params {
            if param.name.is_empty() || !seen.insert(param.name.as_str()) {
                return Err(IconAgentError::Config(format!(
                    "Capability '{}' declares an empty or duplicate parameter '{}'",
                    self.name, param.name
                )));
            }
        }

        Ok(())
    }

    /// Validate call arguments against the declared parameters
    ///
    /// # Errors
    ///
    /// Returns `ArgumentValidation` when the arguments are not an object, a
    /// required parameter is missing, a value has the wrong type, or an
    /// undeclared parameter is present
    pub fn validate_args(&self, args: &Value) -> std::result::Result<(), IconAgentError> {
        let invalid = |message: String| IconAgentError::ArgumentValidation {
            tool: self.name.clone(),
            message,
        };

        let object = args
            .as_object()
            .ok_or_else(|| invalid(format!("expected a JSON object, got {}", args)))?;

        for param in &self.params {
            match object.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(invalid(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(invalid(format!(
                        "parameter '{}' must be {}",
                        param.name, param.kind
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(invalid(format!("unexpected parameter '{}'", unknown)));
        }

        Ok(())
    }
}

/// Tool result structure
///
/// Represents the result of a tool execution with truncation support.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Whether the output was truncated
    pub truncated: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            truncated: false,
        }
    }

    /// Create a failed tool result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            truncated: false,
        }
    }

    /// Truncate output if it exceeds the maximum size
    ///
    /// Truncation happens on a character boundary so the output stays valid
    /// UTF-8.
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }
}

/// Tool executor trait for implementing capability logic
///
/// Each capability implements this trait; the registry and dispatcher only
/// ever see `Arc<dyn ToolExecutor>`.
///
/// # Examples
///
/// ```no_run
/// use iconagent::tools::{OutputKind, Tool, ToolExecutor, ToolResult};
/// use iconagent::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct Echo;
///
/// #[async_trait]
/// impl ToolExecutor for Echo {
///     fn tool_definition(&self) -> Tool {
///         Tool::new("echo", "Echoes its input", vec![], OutputKind::Text)
///     }
///
///     async fn execute(&self, args: Value) -> Result<ToolResult> {
///         Ok(ToolResult::success(args.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the capability definition
    fn tool_definition(&self) -> Tool;

    /// Executes the tool with already-validated arguments
    ///
    /// # Errors
    ///
    /// Returns error if execution fails; the dispatcher turns it into a
    /// tool-error result for the model
    async fn execute(&self, args: Value) -> Result<ToolResult>;
}

struct RegisteredTool {
    definition: Tool,
    executor: Arc<dyn ToolExecutor>,
}

/// Capability registry
///
/// Append-only while a run is in progress; preserves registration order so
/// the model always sees the capabilities in the same order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCapability` if the name is already registered (the
    /// registry is left unchanged) or `Config` if the definition is malformed
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) -> Result<()> {
        let definition = executor.tool_definition();
        definition.check_definition()?;

        if self.index.contains_key(&definition.name) {
            return Err(IconAgentError::DuplicateCapability(definition.name).into());
        }

        tracing::debug!(tool.name = %definition.name, "Registered capability");
        self.index.insert(definition.name.clone(), self.entries.len());
        self.entries.push(RegisteredTool {
            definition,
            executor,
        });
        Ok(())
    }

    /// Look up a capability by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownCapability` if no capability has that name
    pub fn lookup(
        &self,
        name: &str,
    ) -> std::result::Result<(&Tool, Arc<dyn ToolExecutor>), IconAgentError> {
        self.index
            .get(name)
            .map(|&i| {
                let entry = &self.entries[i];
                (&entry.definition, Arc::clone(&entry.executor))
            })
            .ok_or_else(|| IconAgentError::UnknownCapability(name.to_string()))
    }

    /// Iterate over all capability definitions in registration order
    ///
    /// Each call starts a fresh iteration.
    pub fn list(&self) -> impl Iterator<Item = &Tool> + '_ {
        self.entries.iter().map(|entry| &entry.definition)
    }

    /// Registered capability names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.list().map(|tool| tool.name.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Boundary to the MCP server that exposes the unified tool catalog.
//!
//! The server owns the wire protocol. The hub only registers uniquely named
//! tools, updates their metadata in place, and removes them.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HubError, HubResult};

pub use rmcp::model::Tool;

/// Caller-side identifiers the server passes to every handler invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationMeta {
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
}

/// Result envelope returned to the MCP caller.
///
/// `content` is opaque to the hub: usually an array of `{type, text}` items,
/// sometimes a bare string from older pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: json!([{ "type": "text", "text": text.into() }]),
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    pub fn from_error(err: &HubError) -> Self {
        Self::error(err.to_string())
    }

    /// Interpret the `data` of a tab's result message.
    ///
    /// Objects carrying `content` are taken as envelopes; anything else is
    /// wrapped as a single text item.
    pub fn from_tab_payload(data: Value) -> Self {
        if data.get("content").is_some() {
            if let Ok(result) = serde_json::from_value::<ToolResult>(data.clone()) {
                return result;
            }
        }
        match data {
            Value::String(text) => Self::text(text),
            Value::Null => Self::text(""),
            other => Self::text(other.to_string()),
        }
    }

    /// Message carried by an error-flagged result, `None` on success.
    pub fn error_message(&self) -> Option<String> {
        self.is_error.then(|| extract_text(&self.content))
    }
}

/// Human-readable text of a content value: the string itself, the joined
/// `text` items of an array, or the serialized value for anything else.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                content.to_string()
            } else {
                texts.join("\n")
            }
        }
        other => other.to_string(),
    }
}

/// Handler the server calls when an external client invokes a tool.
///
/// Handlers never fail: errors are reported through [`ToolResult::is_error`].
pub type ToolHandler = Arc<dyn Fn(Value, InvocationMeta) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// Live registration of one tool on the server.
pub trait ToolRegistration: Send + Sync {
    /// Replace description, schema and annotations. The name never changes.
    fn update(&self, config: Tool) -> HubResult<()>;

    fn remove(&self);
}

/// The MCP server the hub registers tools on.
pub trait ToolServer: Send + Sync {
    /// Register `config` under `name`. Names must be unique on the server.
    fn register_tool(
        &self,
        name: &str,
        config: Tool,
        handler: ToolHandler,
    ) -> HubResult<Box<dyn ToolRegistration>>;
}

//! Hub configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{HubError, HubResult},
    naming::sanitize_name,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    /// How long an invocation of a cached tool waits for the reopened page
    /// to announce its tools.
    #[serde(default = "default_reopen_timeout_ms")]
    pub reopen_timeout_ms: u64,

    /// Optional bound on a single tab round trip. Without it, only channel
    /// closure fails an outstanding request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Maximum number of in-flight calls kept by the tracker.
    #[serde(default = "default_max_tracked_calls")]
    pub max_tracked_calls: usize,

    /// Buffer of the finished-call broadcast channel.
    #[serde(default = "default_call_event_capacity")]
    pub call_event_capacity: usize,

    /// Bring a live tool's tab to the front before invoking it.
    #[serde(default = "default_true")]
    pub focus_on_invoke: bool,

    /// First segment of every synthesized tool name.
    #[serde(default = "default_tool_name_prefix")]
    pub tool_name_prefix: String,

    /// Id of the extension hosting the hub, recorded on calls of its own
    /// tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// A configuration value outside its accepted range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ConfigValidationError {}

// Default value functions
fn default_reopen_timeout_ms() -> u64 {
    10_000
}

fn default_max_tracked_calls() -> usize {
    1000
}

fn default_call_event_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_tool_name_prefix() -> String {
    "website_tool".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            reopen_timeout_ms: default_reopen_timeout_ms(),
            request_timeout_ms: None,
            max_tracked_calls: default_max_tracked_calls(),
            call_event_capacity: default_call_event_capacity(),
            focus_on_invoke: true,
            tool_name_prefix: default_tool_name_prefix(),
            extension_id: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl HubConfig {
    pub fn from_yaml(yaml: &str) -> HubResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| HubError::Config(e.to_string()))
    }

    /// Load configuration from a YAML file.
    pub async fn from_file(path: &str) -> HubResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.reopen_timeout_ms == 0 {
            return Err(ConfigValidationError {
                field: "reopen_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigValidationError {
                field: "request_timeout_ms",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if self.max_tracked_calls == 0 {
            return Err(ConfigValidationError {
                field: "max_tracked_calls",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.call_event_capacity == 0 {
            return Err(ConfigValidationError {
                field: "call_event_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if sanitize_name(&self.tool_name_prefix).is_empty() {
            return Err(ConfigValidationError {
                field: "tool_name_prefix",
                reason: format!(
                    "'{}' has no characters legal in a tool name",
                    self.tool_name_prefix
                ),
            });
        }
        Ok(())
    }

    pub fn reopen_timeout(&self) -> Duration {
        Duration::from_millis(self.reopen_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

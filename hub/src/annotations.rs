//! Tool annotations announced alongside each tool.
//!
//! Tabs send annotations with MCP hint names (`readOnlyHint`, ...) plus the
//! hub-specific `cacheable` flag. Missing hints take conservative defaults
//! (destructive=true, open_world=true), matching how MCP clients read them.

use rmcp::model::ToolAnnotations as RmcpToolAnnotations;
use serde::{Deserialize, Serialize};

/// Tool behavior hints plus the cache-on-close flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(rename = "readOnlyHint", default)]
    pub read_only: bool,
    #[serde(rename = "destructiveHint", default = "default_true")]
    pub destructive: bool,
    #[serde(rename = "idempotentHint", default)]
    pub idempotent: bool,
    #[serde(rename = "openWorldHint", default = "default_true")]
    pub open_world: bool,
    /// Keep this tool callable after its tab closes by reopening the page.
    #[serde(default)]
    pub cacheable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ToolAnnotations {
    fn default() -> Self {
        Self {
            read_only: false,
            destructive: true,
            idempotent: false,
            open_world: true,
            cacheable: false,
        }
    }
}

impl ToolAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_read_only(mut self, v: bool) -> Self {
        self.read_only = v;
        self
    }

    #[must_use]
    pub fn with_destructive(mut self, v: bool) -> Self {
        self.destructive = v;
        self
    }

    #[must_use]
    pub fn with_cacheable(mut self, v: bool) -> Self {
        self.cacheable = v;
        self
    }

    /// Hints in the shape the MCP server advertises. `cacheable` has no MCP
    /// counterpart and is dropped.
    pub fn to_rmcp(&self, title: Option<&str>) -> RmcpToolAnnotations {
        RmcpToolAnnotations {
            title: title.map(str::to_string),
            read_only_hint: Some(self.read_only),
            destructive_hint: Some(self.destructive),
            idempotent_hint: Some(self.idempotent),
            open_world_hint: Some(self.open_world),
        }
    }
}

//! Invocation context and tool-call records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{catalog::DataSourceId, platform::TabId, server::InvocationMeta};

/// Where the invoked tool lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    /// Announced by a live tab.
    Website,
    /// Part of the extension's own API surface.
    Extension,
    /// Snapshot of a closed tab; invoking it reopens the page.
    Cached,
}

/// Unique identifier for a caller session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallContext {
    pub request_id: String,
    pub source: ToolSource,
    pub client_id: Option<String>,
    pub session_id: SessionId,
    pub tab_id: Option<TabId>,
    pub domain: Option<String>,
    pub extension_id: Option<String>,
    pub origin_url: Option<String>,
    pub is_active_tab: Option<bool>,
    pub data_id: Option<DataSourceId>,
}

impl CallContext {
    pub fn new(source: ToolSource) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            source,
            client_id: None,
            session_id: SessionId::default(),
            tab_id: None,
            domain: None,
            extension_id: None,
            origin_url: None,
            is_active_tab: None,
            data_id: None,
        }
    }

    /// Take request, session and client ids from the server's metadata,
    /// keeping generated ids where the server supplied none.
    #[must_use]
    pub fn with_meta(mut self, meta: &InvocationMeta) -> Self {
        if let Some(request_id) = &meta.request_id {
            self.request_id = request_id.clone();
        }
        if let Some(session_id) = &meta.session_id {
            self.session_id = SessionId::new(session_id.clone());
        }
        self.client_id = meta.client_id.clone();
        self
    }

    #[must_use]
    pub fn with_tab(mut self, tab_id: Option<TabId>, is_active: bool) -> Self {
        self.tab_id = tab_id;
        self.is_active_tab = tab_id.map(|_| is_active);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_data_id(mut self, data_id: DataSourceId) -> Self {
        self.data_id = Some(data_id);
        self
    }

    #[must_use]
    pub fn with_extension_id(mut self, extension_id: impl Into<String>) -> Self {
        self.extension_id = Some(extension_id.into());
        self
    }
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Initiated,
    Executing,
    Completed,
    Failed,
    Timeout,
}

impl CallStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Timeout
        )
    }
}

/// One tracked tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub context: CallContext,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub executing_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: Value, context: CallContext) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
            context,
            status: CallStatus::Initiated,
            started_at: Utc::now(),
            executing_at: None,
            ended_at: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Stamp the end time, status and duration.
    pub(crate) fn finish(&mut self, status: CallStatus, error: Option<String>) {
        let ended_at = Utc::now();
        self.duration_ms = Some(
            (ended_at - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.ended_at = Some(ended_at);
        self.status = status;
        self.error = error;
    }
}

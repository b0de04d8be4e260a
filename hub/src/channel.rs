//! Messages and ports for the tab channel.
//!
//! A tab-side script opens a duplex channel to the hub. The hub wraps the
//! outbound half in a [`TabPort`]; inbound traffic arrives as [`TabMessage`]s
//! on the stream handed to
//! [`TabHub::connect_channel`](crate::core::TabHub::connect_channel).

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    catalog::ToolDescriptor,
    error::{HubError, HubResult},
    platform::TabId,
};

/// Tab -> hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TabMessage {
    /// First catalog announced after the channel opens.
    AnnounceTools { tools: Vec<ToolDescriptor> },
    /// Replacement catalog after the page changed its tools.
    ToolsChanged { tools: Vec<ToolDescriptor> },
    /// Answer to an [`HubMessage::Invoke`].
    #[serde(rename_all = "camelCase")]
    Result {
        request_id: String,
        #[serde(default)]
        data: Value,
    },
}

/// Hub -> tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HubMessage {
    /// Ask the page to re-announce its tools.
    RefreshRequest,
    #[serde(rename_all = "camelCase")]
    Invoke {
        request_id: String,
        tool_name: String,
        args: Value,
    },
}

/// Outbound half of a tab channel.
pub trait TabChannel: Send + Sync {
    fn send(&self, message: HubMessage) -> HubResult<()>;
}

impl TabChannel for mpsc::UnboundedSender<HubMessage> {
    fn send(&self, message: HubMessage) -> HubResult<()> {
        mpsc::UnboundedSender::send(self, message)
            .map_err(|_| HubError::ChannelSend("receiver dropped".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// A connected tab channel together with the tab it came from.
pub struct TabPort {
    id: ChannelId,
    tab_id: TabId,
    url: String,
    domain: String,
    sink: Arc<dyn TabChannel>,
    closed: AtomicBool,
}

impl TabPort {
    pub fn new(
        id: ChannelId,
        tab_id: TabId,
        url: impl Into<String>,
        domain: impl Into<String>,
        sink: Arc<dyn TabChannel>,
    ) -> Self {
        Self {
            id,
            tab_id,
            url: url.into(),
            domain: domain.into(),
            sink,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns false if the port was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn send(&self, message: HubMessage) -> HubResult<()> {
        if self.is_closed() {
            return Err(HubError::ChannelClosed(self.to_string()));
        }
        self.sink.send(message)
    }
}

impl fmt::Display for TabPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tab {} on {})", self.id, self.tab_id, self.domain)
    }
}

impl fmt::Debug for TabPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabPort")
            .field("id", &self.id)
            .field("tab_id", &self.tab_id)
            .field("domain", &self.domain)
            .field("closed", &self.is_closed())
            .finish()
    }
}

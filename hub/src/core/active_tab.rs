//! Focused-tab bookkeeping.
//!
//! The active tab is resolved from the platform once, lazily, and then kept
//! current by focus-change notifications. It only affects tool descriptions
//! and whether an invocation first focuses its tab.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::platform::{TabId, TabPlatform};

/// How a catalog tool's owning page currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Active,
    Background,
    Cached,
}

impl TabStatus {
    fn label(self) -> &'static str {
        match self {
            TabStatus::Active => "active tab",
            TabStatus::Background => "background tab",
            TabStatus::Cached => "cached, reopens the page when called",
        }
    }
}

/// Externally visible description of a catalog tool.
pub fn describe_tool(domain: &str, status: TabStatus, description: &str) -> String {
    if description.is_empty() {
        format!("[{}, {}]", domain, status.label())
    } else {
        format!("[{}, {}] {}", domain, status.label(), description)
    }
}

#[derive(Default)]
pub struct ActiveTabTracker {
    current: RwLock<Option<TabId>>,
    init: OnceCell<()>,
}

impl ActiveTabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the platform for the focused tab, once. Failures leave the
    /// active tab unknown.
    pub async fn ensure_initialized(&self, platform: &dyn TabPlatform) {
        self.init
            .get_or_init(|| async {
                match platform.active_tab().await {
                    Ok(Some(tab)) => {
                        let mut current = self.current.write();
                        // A focus change may have landed while we were asking.
                        if current.is_none() {
                            *current = Some(tab.id);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Could not resolve the active tab"),
                }
            })
            .await;
    }

    pub fn current(&self) -> Option<TabId> {
        *self.current.read()
    }

    /// Record a focus change and return the previously active tab.
    pub fn set(&self, tab_id: TabId) -> Option<TabId> {
        self.current.write().replace(tab_id)
    }

    pub fn is_active(&self, tab_id: TabId) -> bool {
        self.current() == Some(tab_id)
    }

    pub fn status_of(&self, tab_id: TabId) -> TabStatus {
        if self.is_active(tab_id) {
            TabStatus::Active
        } else {
            TabStatus::Background
        }
    }
}

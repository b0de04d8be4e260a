//! Pending tab reopens.
//!
//! Invoking a cached tool reopens its page and waits for the new tab to
//! announce. One reopen runs per cached source: the first caller leads and
//! creates the tab, later callers join its waiter list. Each reopen is
//! indexed both by the cached source and, once the tab exists, by the new
//! tab id, so it can be settled from the announcement and swept from both
//! indices on failure.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{catalog::CatalogKey, channel::TabPort, error::ReopenError, platform::TabId};

pub type ReopenOutcome = Result<Arc<TabPort>, ReopenError>;

struct ReopenSlot {
    url: String,
    tab_id: Option<TabId>,
    waiters: Vec<oneshot::Sender<ReopenOutcome>>,
}

#[derive(Default)]
struct ReopenIndex {
    by_source: HashMap<CatalogKey, ReopenSlot>,
    by_tab: HashMap<TabId, CatalogKey>,
}

/// Result of joining a reopen.
pub struct ReopenTicket {
    pub rx: oneshot::Receiver<ReopenOutcome>,
    /// The caller started this reopen and must create the tab.
    pub is_leader: bool,
}

#[derive(Default)]
pub struct PendingReopens {
    inner: Mutex<ReopenIndex>,
}

impl PendingReopens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait on the reopen of `source`, starting it if none is in flight.
    pub fn join(&self, source: &CatalogKey, url: &str) -> ReopenTicket {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        match inner.by_source.get_mut(source) {
            Some(slot) => {
                slot.waiters.push(tx);
                debug!(source = %source, waiters = slot.waiters.len(), "Joined pending reopen");
                ReopenTicket {
                    rx,
                    is_leader: false,
                }
            }
            None => {
                inner.by_source.insert(
                    source.clone(),
                    ReopenSlot {
                        url: url.to_string(),
                        tab_id: None,
                        waiters: vec![tx],
                    },
                );
                ReopenTicket {
                    rx,
                    is_leader: true,
                }
            }
        }
    }

    /// Record the tab created for `source`. Returns false if the reopen was
    /// already settled or failed.
    pub fn bind_tab(&self, source: &CatalogKey, tab_id: TabId) -> bool {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.by_source.get_mut(source) else {
            return false;
        };
        slot.tab_id = Some(tab_id);
        inner.by_tab.insert(tab_id, source.clone());
        true
    }

    /// Hand `port` to every caller waiting on the reopen bound to `tab_id`.
    /// Returns the cached source that was being reopened.
    pub fn settle_tab(&self, tab_id: TabId, port: &Arc<TabPort>) -> Option<CatalogKey> {
        let (source, slot) = {
            let mut inner = self.inner.lock();
            let source = inner.by_tab.remove(&tab_id)?;
            let slot = inner.by_source.remove(&source)?;
            (source, slot)
        };
        debug!(
            source = %source,
            tab_id = tab_id,
            waiters = slot.waiters.len(),
            "Reopen settled"
        );
        for waiter in slot.waiters {
            let _ = waiter.send(Ok(Arc::clone(port)));
        }
        Some(source)
    }

    /// Fail the reopen of `source`. Returns false if none was pending.
    pub fn fail(&self, source: &CatalogKey, error: ReopenError) -> bool {
        let slot = {
            let mut inner = self.inner.lock();
            let Some(slot) = inner.by_source.remove(source) else {
                return false;
            };
            if let Some(tab_id) = slot.tab_id {
                inner.by_tab.remove(&tab_id);
            }
            slot
        };
        debug!(source = %source, url = %slot.url, error = %error, "Reopen failed");
        for waiter in slot.waiters {
            let _ = waiter.send(Err(error.clone()));
        }
        true
    }

    /// Forget waiters that stopped listening. A reopen nobody waits on any
    /// more is dropped from both indices so the next caller starts afresh.
    /// Returns true if the reopen was dropped.
    pub fn release(&self, source: &CatalogKey) -> bool {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.by_source.get_mut(source) else {
            return false;
        };
        slot.waiters.retain(|waiter| !waiter.is_closed());
        if !slot.waiters.is_empty() {
            return false;
        }
        if let Some(slot) = inner.by_source.remove(source) {
            if let Some(tab_id) = slot.tab_id {
                inner.by_tab.remove(&tab_id);
            }
        }
        debug!(source = %source, "Abandoned reopen dropped");
        true
    }

    /// Fail every pending reopen. Returns how many were pending.
    pub fn fail_all(&self, error: ReopenError) -> usize {
        let slots: Vec<ReopenSlot> = {
            let mut inner = self.inner.lock();
            inner.by_tab.clear();
            inner.by_source.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        for slot in slots {
            for waiter in slot.waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().by_source.len()
    }

    pub fn is_pending_for_tab(&self, tab_id: TabId) -> bool {
        self.inner.lock().by_tab.contains_key(&tab_id)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        catalog::DataSourceId,
        channel::{ChannelId, TabPort},
    };

    fn source() -> CatalogKey {
        CatalogKey::new("example.com", DataSourceId::Cached(1700))
    }

    fn port(tab_id: TabId) -> Arc<TabPort> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(TabPort::new(
            ChannelId(9),
            tab_id,
            "https://example.com/",
            "example.com",
            Arc::new(tx),
        ))
    }

    #[tokio::test]
    async fn test_single_leader_and_shared_settlement() {
        let reopens = PendingReopens::new();
        let first = reopens.join(&source(), "https://example.com/");
        let second = reopens.join(&source(), "https://example.com/");
        assert!(first.is_leader);
        assert!(!second.is_leader);
        assert_eq!(reopens.pending_count(), 1);

        assert!(reopens.bind_tab(&source(), 42));
        assert!(reopens.is_pending_for_tab(42));

        let port = port(42);
        assert_eq!(reopens.settle_tab(42, &port), Some(source()));
        assert_eq!(first.rx.await.unwrap().unwrap().tab_id(), 42);
        assert_eq!(second.rx.await.unwrap().unwrap().tab_id(), 42);
        assert_eq!(reopens.pending_count(), 0);
        assert!(!reopens.is_pending_for_tab(42));
    }

    #[test]
    fn test_settle_unbound_tab_is_noop() {
        let reopens = PendingReopens::new();
        let _ticket = reopens.join(&source(), "https://example.com/");
        assert_eq!(reopens.settle_tab(42, &port(42)), None);
        assert_eq!(reopens.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_sweeps_both_indices() {
        let reopens = PendingReopens::new();
        let ticket = reopens.join(&source(), "https://example.com/");
        reopens.bind_tab(&source(), 7);

        let error = ReopenError::Timeout {
            url: "https://example.com/".to_string(),
            timeout_ms: 10,
        };
        assert!(reopens.fail(&source(), error.clone()));
        assert!(!reopens.fail(&source(), error.clone()));
        assert!(!reopens.is_pending_for_tab(7));
        assert_eq!(ticket.rx.await.unwrap().unwrap_err(), error);

        // A late announcement finds nothing to settle.
        assert_eq!(reopens.settle_tab(7, &port(7)), None);
        assert!(!reopens.bind_tab(&source(), 7));
    }

    #[test]
    fn test_release_drops_abandoned_reopen() {
        let reopens = PendingReopens::new();
        let leader = reopens.join(&source(), "https://example.com/");
        let follower = reopens.join(&source(), "https://example.com/");
        reopens.bind_tab(&source(), 7);

        drop(leader);
        assert!(!reopens.release(&source()));
        assert_eq!(reopens.pending_count(), 1);

        drop(follower);
        assert!(reopens.release(&source()));
        assert_eq!(reopens.pending_count(), 0);
        assert!(!reopens.is_pending_for_tab(7));

        // The next caller leads a fresh reopen.
        assert!(reopens.join(&source(), "https://example.com/").is_leader);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let reopens = PendingReopens::new();
        let a = reopens.join(&source(), "https://example.com/");
        let other = CatalogKey::new("other.test", DataSourceId::Cached(5));
        let b = reopens.join(&other, "https://other.test/");

        assert_eq!(reopens.fail_all(ReopenError::Aborted("shutdown".to_string())), 2);
        assert!(matches!(a.rx.await.unwrap(), Err(ReopenError::Aborted(_))));
        assert!(matches!(b.rx.await.unwrap(), Err(ReopenError::Aborted(_))));
        assert_eq!(reopens.pending_count(), 0);
    }
}

//! Tool lifecycle coordinator.
//!
//! [`TabHub`] owns the catalog registry and the index of tools registered on
//! the MCP server, and is their only writer. It reacts to tab channels
//! connecting, announcing and disconnecting, keeps the server's tool list in
//! step with the catalog, caches tools of closed tabs, and reopens pages when
//! a cached tool is invoked.
//!
//! All catalog and registration changes happen under one synchronous lock.
//! The only suspension points are platform queries, tab round trips and
//! waiting for a reopened page.

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    active_tab::{describe_tool, ActiveTabTracker, TabStatus},
    config::HubConfig,
    metrics::HubMetrics,
    reopen::{PendingReopens, ReopenTicket},
};
use crate::{
    annotations::ToolAnnotations,
    catalog::{CatalogEntry, CatalogKey, CatalogRegistry, DataSourceId, RegistryCounts, ToolDescriptor},
    channel::{ChannelId, HubMessage, TabChannel, TabMessage, TabPort},
    correlation::RequestCorrelator,
    error::{HubError, HubResult, ReopenError},
    naming::{domain_from_url, external_tool_name, sanitize_name},
    platform::{TabId, TabInfo, TabPlatform},
    server::{InvocationMeta, Tool, ToolHandler, ToolRegistration, ToolResult, ToolServer},
    tracking::{CallContext, CallTracker, ToolSource},
};

/// Name of the tool listing the extension's own capabilities.
pub const CAPABILITY_INDEX_TOOL: &str = "list_extension_capabilities";

/// Handler for a tool of the extension's own API surface.
pub type ExtensionHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, HubResult<ToolResult>> + Send + Sync>;

/// A catalog tool exposed on the server.
struct RegisteredTool {
    key: CatalogKey,
    tool_name: String,
    handle: Box<dyn ToolRegistration>,
}

struct ExtensionTool {
    descriptor: ToolDescriptor,
    handle: Box<dyn ToolRegistration>,
}

#[derive(Default)]
struct HubState {
    catalog: CatalogRegistry,
    /// Keyed by external tool name.
    registered: HashMap<String, RegisteredTool>,
    extension: HashMap<String, ExtensionTool>,
}

/// Read-only view of one catalog entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub domain: String,
    pub data_id: DataSourceId,
    pub url: String,
    pub tab_id: Option<TabId>,
    pub closed: bool,
    pub tools: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

pub struct TabHub {
    self_ref: Weak<TabHub>,
    state: Mutex<HubState>,
    server: Arc<dyn ToolServer>,
    platform: Arc<dyn TabPlatform>,
    correlator: RequestCorrelator,
    tracker: Arc<CallTracker>,
    active_tab: ActiveTabTracker,
    reopens: PendingReopens,
    metrics: Arc<HubMetrics>,
    config: HubConfig,
    next_channel_id: AtomicU64,
    shutdown_token: CancellationToken,
}

impl TabHub {
    pub fn new(
        config: HubConfig,
        server: Arc<dyn ToolServer>,
        platform: Arc<dyn TabPlatform>,
    ) -> HubResult<Arc<Self>> {
        config
            .validate()
            .map_err(|e| HubError::Config(e.to_string()))?;

        let metrics = Arc::new(HubMetrics::new());
        let tracker = Arc::new(CallTracker::with_capacity(
            config.max_tracked_calls,
            config.call_event_capacity,
            Arc::clone(&metrics),
        ));

        Ok(Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            state: Mutex::new(HubState::default()),
            server,
            platform,
            correlator: RequestCorrelator::new(),
            tracker,
            active_tab: ActiveTabTracker::new(),
            reopens: PendingReopens::new(),
            metrics,
            config,
            next_channel_id: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
        }))
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Wrap the outbound half of a new tab channel.
    pub fn open_port(&self, tab: &TabInfo, sink: Arc<dyn TabChannel>) -> Arc<TabPort> {
        let id = ChannelId(self.next_channel_id.fetch_add(1, Ordering::Relaxed) + 1);
        let domain = domain_from_url(tab.url.as_deref());
        let url = tab.url.clone().unwrap_or_default();
        self.metrics.record_channel_opened();
        info!(channel = %id, tab_id = tab.id, domain = %domain, "Tab channel connected");
        Arc::new(TabPort::new(id, tab.id, url, domain, sink))
    }

    /// Open a port and serve its inbound messages in arrival order until the
    /// stream ends or the hub shuts down, then run the disconnect path.
    pub fn connect_channel(
        &self,
        tab: TabInfo,
        sink: Arc<dyn TabChannel>,
        mut inbound: mpsc::Receiver<TabMessage>,
    ) -> Arc<TabPort> {
        let port = self.open_port(&tab, sink);
        let serving = Arc::clone(&port);
        let hub = self.self_ref.clone();
        let token = self.shutdown_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(channel = %serving.id(), "Channel loop shutting down");
                        break;
                    }
                    message = inbound.recv() => {
                        let Some(message) = message else { break };
                        let Some(hub) = hub.upgrade() else { break };
                        hub.handle_message(&serving, message).await;
                    }
                }
            }
            if let Some(hub) = hub.upgrade() {
                hub.handle_disconnect(&serving);
            }
        });

        port
    }

    pub async fn handle_message(&self, port: &Arc<TabPort>, message: TabMessage) {
        match message {
            TabMessage::AnnounceTools { tools } => {
                self.register_or_update_tools(port, tools, false).await
            }
            TabMessage::ToolsChanged { tools } => {
                self.register_or_update_tools(port, tools, true).await
            }
            TabMessage::Result { request_id, data } => {
                if !self.correlator.resolve(&request_id, data) {
                    debug!(channel = %port.id(), request_id = %request_id, "Dropped late result");
                }
            }
        }
    }

    /// Store a tab's catalog and bring the server's registrations in line
    /// with it.
    ///
    /// Tools that vanished since the previous catalog of the same entry are
    /// unregistered. If the tab was opened to revive a cached entry, the
    /// waiting invocations get this port and the cached entry is discarded.
    pub async fn register_or_update_tools(
        &self,
        port: &Arc<TabPort>,
        tools: Vec<ToolDescriptor>,
        is_update: bool,
    ) {
        self.active_tab
            .ensure_initialized(self.platform.as_ref())
            .await;
        if port.is_closed() {
            debug!(channel = %port.id(), "Ignoring announcement from closed channel");
            return;
        }

        let key = CatalogKey::new(port.domain(), DataSourceId::Tab(port.tab_id()));
        let tools = dedupe_tools(tools, &key);
        let status = self.active_tab.status_of(port.tab_id());

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            // The same tab may still have a live entry under the domain it
            // navigated away from.
            let moved: Vec<String> = state
                .catalog
                .iter()
                .filter(|(domain, data_id, _)| *domain != key.domain && **data_id == key.data_id)
                .map(|(domain, _, _)| domain.to_string())
                .collect();
            for domain in moved {
                self.retire_live_entry(state, &CatalogKey::new(domain, key.data_id));
            }

            let previous = state.catalog.upsert_entry(
                &key.domain,
                key.data_id,
                CatalogEntry::live(port, tools.clone()),
            );

            // Vanished tools go first so a survivor sharing their sanitized
            // name can take it over below.
            let mut removed = 0;
            if let Some(previous) = previous {
                let current: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                for stale in previous.tool_names().filter(|name| !current.contains(name)) {
                    self.unregister(state, &key, stale);
                    removed += 1;
                }
            }

            for tool in &tools {
                self.register_catalog_tool(state, &key, tool, status);
            }

            info!(
                source = %key,
                tools = tools.len(),
                removed = removed,
                is_update = is_update,
                "Registered tab tools"
            );
        }

        self.complete_reopen(port);
    }

    /// Tear down the live entry served by `port`.
    ///
    /// Cacheable tools survive as a new closed entry registered under cached
    /// names. A port that no longer owns its entry only has its pending
    /// requests rejected.
    pub fn handle_disconnect(&self, port: &Arc<TabPort>) {
        if !port.mark_closed() {
            return;
        }
        self.metrics.record_channel_closed();
        let rejected = self
            .correlator
            .reject_channel(port.id(), &format!("{} disconnected", port));
        if rejected > 0 {
            debug!(channel = %port.id(), rejected = rejected, "Rejected pending requests");
        }
        if self.shutdown_token.is_cancelled() {
            return;
        }

        let key = CatalogKey::new(port.domain(), DataSourceId::Tab(port.tab_id()));
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let owns_entry = state
            .catalog
            .get_entry(&key.domain, &key.data_id)
            .and_then(|entry| entry.channel.as_ref())
            .is_some_and(|channel| channel.as_ptr() == Arc::as_ptr(port));
        if !owns_entry {
            debug!(channel = %port.id(), source = %key, "Disconnect of superseded channel");
            return;
        }

        match self.retire_live_entry(state, &key) {
            Some(cached) => info!(source = %key, cached = %cached, "Tab closed, kept cacheable tools"),
            None => info!(source = %key, "Tab closed"),
        }
    }

    /// Remove a live entry and its registrations, caching its cacheable
    /// tools. Returns the key of the new cached entry, if any.
    fn retire_live_entry(&self, state: &mut HubState, key: &CatalogKey) -> Option<CatalogKey> {
        let entry = state.catalog.remove_entry(&key.domain, &key.data_id)?;
        for name in entry.tool_names() {
            self.unregister(state, key, name);
        }

        let cacheable = entry.cacheable_tools();
        if cacheable.is_empty() || entry.closed {
            return None;
        }

        let cached_id = state
            .catalog
            .next_cached_id(&key.domain, Utc::now().timestamp_millis());
        let cached_key = CatalogKey::new(key.domain.clone(), cached_id);
        state.catalog.upsert_entry(
            &key.domain,
            cached_id,
            CatalogEntry::cached(key.domain.clone(), entry.url.clone(), cacheable.clone()),
        );
        for tool in &cacheable {
            self.register_catalog_tool(state, &cached_key, tool, TabStatus::Cached);
        }
        Some(cached_key)
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    fn external_name(&self, key: &CatalogKey, tool_name: &str) -> String {
        external_tool_name(
            &self.config.tool_name_prefix,
            &key.domain,
            &key.data_id,
            tool_name,
        )
    }

    fn register_catalog_tool(
        &self,
        state: &mut HubState,
        key: &CatalogKey,
        tool: &ToolDescriptor,
        status: TabStatus,
    ) {
        let name = self.external_name(key, &tool.name);
        let config = catalog_tool_config(&name, &key.domain, status, tool);

        if let Some(existing) = state.registered.get(&name) {
            if existing.key != *key || existing.tool_name != tool.name {
                warn!(
                    name = %name,
                    tool = %tool.name,
                    existing = %existing.tool_name,
                    "Tool name collides after sanitizing, skipping"
                );
                return;
            }
            if let Err(e) = existing.handle.update(config) {
                warn!(name = %name, error = %e, "Failed to update tool");
            }
            return;
        }

        let handler = self.catalog_handler(key.clone(), tool.name.clone());
        match self.server.register_tool(&name, config, handler) {
            Ok(handle) => {
                debug!(name = %name, source = %key, "Registered tool");
                state.registered.insert(
                    name,
                    RegisteredTool {
                        key: key.clone(),
                        tool_name: tool.name.clone(),
                        handle,
                    },
                );
            }
            Err(e) => warn!(name = %name, error = %e, "Failed to register tool"),
        }
    }

    /// Remove the registration of `tool_name` from `key`. A name held by a
    /// different tool after sanitizing is left alone.
    fn unregister(&self, state: &mut HubState, key: &CatalogKey, tool_name: &str) {
        let name = self.external_name(key, tool_name);
        let owned = state
            .registered
            .get(&name)
            .is_some_and(|tool| tool.key == *key && tool.tool_name == tool_name);
        if !owned {
            return;
        }
        if let Some(tool) = state.registered.remove(&name) {
            tool.handle.remove();
            debug!(name = %name, "Removed tool");
        }
    }

    /// Unregister every tool of an entry and drop it from the registry.
    fn discard_entry(&self, state: &mut HubState, key: &CatalogKey) {
        if let Some(entry) = state.catalog.remove_entry(&key.domain, &key.data_id) {
            for name in entry.tool_names() {
                self.unregister(state, key, name);
            }
        }
    }

    fn catalog_handler(&self, key: CatalogKey, tool_name: String) -> ToolHandler {
        let hub = self.self_ref.clone();
        Arc::new(move |args: Value, meta: InvocationMeta| {
            let hub = hub.clone();
            let key = key.clone();
            let tool_name = tool_name.clone();
            async move {
                match hub.upgrade() {
                    Some(hub) => hub.invoke_catalog_tool(&key, &tool_name, args, meta).await,
                    None => ToolResult::error("Tab hub is no longer running"),
                }
            }
            .boxed()
        })
    }

    /// Recompute descriptions of a live entry's tools and push them as
    /// metadata-only updates. Returns how many registrations were updated.
    pub fn refresh_descriptions(&self, domain: &str, data_id: &DataSourceId) -> usize {
        let state = self.state.lock();
        let Some(entry) = state.catalog.get_entry(domain, data_id) else {
            return 0;
        };
        if entry.closed {
            return 0;
        }
        let status = entry
            .tab_id
            .map_or(TabStatus::Cached, |tab_id| self.active_tab.status_of(tab_id));
        let key = CatalogKey::new(domain, *data_id);

        let mut updated = 0;
        for tool in &entry.tools {
            let name = self.external_name(&key, &tool.name);
            let Some(registered) = state.registered.get(&name) else {
                continue;
            };
            match registered
                .handle
                .update(catalog_tool_config(&name, domain, status, tool))
            {
                Ok(()) => updated += 1,
                Err(e) => debug!(name = %name, error = %e, "Description refresh failed"),
            }
        }
        updated
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a catalog tool under tracking. Never fails: errors come back
    /// as error-flagged results.
    pub async fn invoke_catalog_tool(
        &self,
        key: &CatalogKey,
        tool_name: &str,
        args: Value,
        meta: InvocationMeta,
    ) -> ToolResult {
        let name = self.external_name(key, tool_name);
        let context = self.call_context(key, &meta);

        self.tracker
            .execute_with_tracking(&name, args, context, |args| {
                self.forward(key, tool_name, args)
            })
            .await
            .unwrap_or_else(|e| {
                if e.is_resolution_failure() {
                    warn!(name = %name, error = %e, "Could not reach the tab owning the tool");
                } else {
                    debug!(name = %name, error = %e, "Invocation failed");
                }
                ToolResult::from_error(&e)
            })
    }

    fn call_context(&self, key: &CatalogKey, meta: &InvocationMeta) -> CallContext {
        let source = if key.data_id.is_cached() {
            ToolSource::Cached
        } else {
            ToolSource::Website
        };
        let context = CallContext::new(source)
            .with_meta(meta)
            .with_domain(key.domain.clone())
            .with_data_id(key.data_id);

        let state = self.state.lock();
        match state.catalog.get_entry(&key.domain, &key.data_id) {
            Some(entry) => {
                let is_active = entry
                    .tab_id
                    .is_some_and(|tab_id| self.active_tab.is_active(tab_id));
                context
                    .with_tab(entry.tab_id, is_active)
                    .with_origin_url(entry.url.clone())
            }
            None => context,
        }
    }

    async fn forward(&self, key: &CatalogKey, tool_name: &str, args: Value) -> HubResult<ToolResult> {
        let port = self.resolve_channel(key).await?;
        let request = self.correlator.send_request(&port, tool_name, args);

        let outcome = match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .unwrap_or_else(|_| Err(HubError::RequestTimeout(limit.as_millis() as u64))),
            None => request.await,
        };

        match outcome {
            Ok(data) => Ok(ToolResult::from_tab_payload(data)),
            Err(e) => {
                if matches!(e, HubError::ChannelClosed(_) | HubError::ChannelSend(_)) {
                    self.metrics.record_channel_error();
                }
                Err(e)
            }
        }
    }

    /// Find a usable port for a catalog entry, reopening the page of a
    /// cached entry.
    pub async fn resolve_channel(&self, key: &CatalogKey) -> HubResult<Arc<TabPort>> {
        let (closed, url, port) = {
            let state = self.state.lock();
            let entry = state
                .catalog
                .get_entry(&key.domain, &key.data_id)
                .ok_or_else(|| HubError::CatalogNotFound {
                    domain: key.domain.clone(),
                    data_id: key.data_id.to_string(),
                })?;
            (entry.closed, entry.url.clone(), entry.port())
        };

        if closed {
            return self.reopen(key, &url).await;
        }

        let port = port
            .filter(|port| !port.is_closed())
            .ok_or_else(|| HubError::ChannelUnavailable(key.to_string()))?;

        if self.config.focus_on_invoke && !self.active_tab.is_active(port.tab_id()) {
            if let Err(e) = self.platform.focus_tab(port.tab_id()).await {
                debug!(tab_id = port.tab_id(), error = %e, "Could not focus tab");
            }
        }
        Ok(port)
    }

    /// Reopen the page of a cached entry and wait for it to announce.
    async fn reopen(&self, key: &CatalogKey, url: &str) -> HubResult<Arc<TabPort>> {
        let ReopenTicket { rx, is_leader } = self.reopens.join(key, url);
        // Runs when this caller stops waiting, including when its future is
        // dropped mid-reopen.
        let mut rx = scopeguard::guard(rx, |rx| {
            drop(rx);
            self.reopens.release(key);
        });

        if is_leader {
            self.metrics.record_reopen_requested();
            info!(source = %key, url = %url, "Reopening page for cached tools");
            match self.platform.create_tab(url).await {
                Ok(tab) => {
                    if self.reopens.bind_tab(key, tab.id) {
                        // The page may have announced before its tab id was bound.
                        let live = self
                            .state
                            .lock()
                            .catalog
                            .find_live_tab(tab.id)
                            .and_then(|(_, entry)| entry.port());
                        if let Some(port) = live {
                            self.complete_reopen(&port);
                        }
                    }
                }
                Err(e) => {
                    let error = ReopenError::TabCreation {
                        url: url.to_string(),
                        reason: e.to_string(),
                    };
                    if self.reopens.fail(key, error) {
                        self.metrics.record_reopen_failed();
                    }
                }
            }
        }

        let limit = self.config.reopen_timeout();
        match tokio::time::timeout(limit, &mut *rx).await {
            Ok(Ok(outcome)) => outcome.map_err(HubError::from),
            Ok(Err(_)) => Err(HubError::ReopenAborted(format!("reopen of {} dropped", key))),
            Err(_) => {
                let error = ReopenError::Timeout {
                    url: url.to_string(),
                    timeout_ms: self.config.reopen_timeout_ms,
                };
                if self.reopens.fail(key, error.clone()) {
                    self.metrics.record_reopen_failed();
                    warn!(source = %key, url = %url, "Reopened page did not announce in time");
                }
                Err(error.into())
            }
        }
    }

    /// Settle a reopen waiting on `port`'s tab and discard the cached entry
    /// it revived.
    fn complete_reopen(&self, port: &Arc<TabPort>) {
        let Some(cached) = self.reopens.settle_tab(port.tab_id(), port) else {
            return;
        };
        self.metrics.record_reopen_succeeded();
        let mut guard = self.state.lock();
        self.discard_entry(&mut guard, &cached);
        info!(cached = %cached, channel = %port.id(), "Cached tools revived by reopened tab");
    }

    // ========================================================================
    // Active tab
    // ========================================================================

    /// React to a focus change: refresh descriptions of the previous and new
    /// tab and ask the new tab to re-announce.
    pub async fn on_active_tab_changed(&self, tab_id: TabId) {
        let previous = self.active_tab.set(tab_id);
        if previous == Some(tab_id) {
            return;
        }
        if let Some(previous) = previous {
            self.refresh_tab(previous, false).await;
        }
        self.refresh_tab(tab_id, true).await;
    }

    async fn refresh_tab(&self, tab_id: TabId, request_catalog: bool) {
        let tab = match self.platform.get_tab(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                debug!(tab_id = tab_id, error = %e, "Skipping refresh of unknown tab");
                return;
            }
        };
        let Some(url) = tab.url.as_deref() else {
            return;
        };
        let domain = domain_from_url(Some(url));
        let data_id = DataSourceId::Tab(tab_id);
        self.refresh_descriptions(&domain, &data_id);

        if request_catalog {
            let port = self
                .state
                .lock()
                .catalog
                .get_entry(&domain, &data_id)
                .and_then(CatalogEntry::port);
            if let Some(port) = port {
                if let Err(e) = port.send(HubMessage::RefreshRequest) {
                    debug!(tab_id = tab_id, error = %e, "Refresh request not delivered");
                }
            }
        }
    }

    /// Consume focus changes until the channel closes or the hub shuts down.
    pub fn spawn_active_tab_listener(&self, mut rx: mpsc::Receiver<TabId>) {
        let token = self.shutdown_token.clone();
        let hub = self.self_ref.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Active-tab listener shutting down");
                        break;
                    }
                    Some(tab_id) = rx.recv() => {
                        let Some(hub) = hub.upgrade() else { break };
                        hub.on_active_tab_changed(tab_id).await;
                    }
                    else => break,
                }
            }
        });
    }

    // ========================================================================
    // Extension tools
    // ========================================================================

    /// Expose a tool of the extension's own API surface. Returns the
    /// registered name.
    pub fn register_extension_tool(
        &self,
        descriptor: ToolDescriptor,
        handler: ExtensionHandler,
    ) -> HubResult<String> {
        let name = sanitize_name(&descriptor.name);
        if name.is_empty() {
            return Err(HubError::Registration {
                name: descriptor.name,
                reason: "name has no legal characters".to_string(),
            });
        }

        let mut state = self.state.lock();
        if state.extension.contains_key(&name) || state.registered.contains_key(&name) {
            return Err(HubError::Registration {
                name,
                reason: "already registered".to_string(),
            });
        }

        let tracker = Arc::clone(&self.tracker);
        let tool_name = name.clone();
        let extension_id = self.config.extension_id.clone();
        let tool_handler: ToolHandler = Arc::new(move |args: Value, meta: InvocationMeta| {
            let tracker = Arc::clone(&tracker);
            let handler = Arc::clone(&handler);
            let tool_name = tool_name.clone();
            let extension_id = extension_id.clone();
            async move {
                let mut context = CallContext::new(ToolSource::Extension).with_meta(&meta);
                if let Some(extension_id) = extension_id {
                    context = context.with_extension_id(extension_id);
                }
                tracker
                    .execute_with_tracking(&tool_name, args, context, |args| handler(args))
                    .await
                    .unwrap_or_else(|e| ToolResult::from_error(&e))
            }
            .boxed()
        });

        let config = Tool {
            name: Cow::Owned(name.clone()),
            title: descriptor.title.clone(),
            description: Some(Cow::Owned(descriptor.description.clone())),
            input_schema: Arc::new(descriptor.input_schema.clone()),
            output_schema: descriptor.output_schema.clone().map(Arc::new),
            annotations: Some(descriptor.annotations.to_rmcp(descriptor.title.as_deref())),
            icons: None,
        };
        let handle = self.server.register_tool(&name, config, tool_handler)?;
        state
            .extension
            .insert(name.clone(), ExtensionTool { descriptor, handle });
        info!(name = %name, "Registered extension tool");
        Ok(name)
    }

    pub fn unregister_extension_tool(&self, name: &str) -> bool {
        match self.state.lock().extension.remove(name) {
            Some(tool) => {
                tool.handle.remove();
                true
            }
            None => false,
        }
    }

    /// Descriptors of the extension's own tools, by name.
    pub fn extension_capabilities(&self) -> Vec<ToolDescriptor> {
        let state = self.state.lock();
        let mut tools: Vec<ToolDescriptor> = state
            .extension
            .iter()
            .filter(|(name, _)| name.as_str() != CAPABILITY_INDEX_TOOL)
            .map(|(_, tool)| tool.descriptor.clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Register the tool listing every extension capability.
    pub fn register_capability_index(&self) -> HubResult<String> {
        let hub = self.self_ref.clone();
        let handler: ExtensionHandler =
            Arc::new(move |_args: Value| Self::capability_listing(hub.clone()).boxed());

        let descriptor = ToolDescriptor::new(
            CAPABILITY_INDEX_TOOL,
            "List the browser capabilities the extension exposes as tools",
        )
        .with_input_schema(no_arguments_schema())
        .with_annotations(
            ToolAnnotations::new()
                .with_read_only(true)
                .with_destructive(false),
        );
        self.register_extension_tool(descriptor, handler)
    }

    async fn capability_listing(hub: Weak<TabHub>) -> HubResult<ToolResult> {
        let hub = hub
            .upgrade()
            .ok_or_else(|| HubError::ToolExecution("tab hub is no longer running".to_string()))?;
        let capabilities: Vec<Value> = hub
            .extension_capabilities()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "title": tool.title,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();
        let listing = json!({ "capabilities": capabilities });
        Ok(ToolResult {
            structured_content: Some(listing.clone()),
            ..ToolResult::text(serde_json::to_string_pretty(&listing)?)
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Every tool name currently registered on the server, sorted.
    pub fn registered_tool_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .registered
            .keys()
            .chain(state.extension.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// The catalog, sorted by domain and data source.
    pub fn catalog_snapshot(&self) -> Vec<CatalogSummary> {
        let state = self.state.lock();
        let mut entries: Vec<CatalogSummary> = state
            .catalog
            .iter()
            .map(|(domain, data_id, entry)| CatalogSummary {
                domain: domain.to_string(),
                data_id: *data_id,
                url: entry.url.clone(),
                tab_id: entry.tab_id,
                closed: entry.closed,
                tools: entry.tool_names().map(str::to_string).collect(),
                updated_at: entry.updated_at,
            })
            .collect();
        entries.sort_by(|a, b| (&a.domain, a.data_id).cmp(&(&b.domain, b.data_id)));
        entries
    }

    pub fn catalog_counts(&self) -> RegistryCounts {
        self.state.lock().catalog.counts()
    }

    pub fn pending_reopen_count(&self) -> usize {
        self.reopens.pending_count()
    }

    pub fn pending_request_count(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab.current()
    }

    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    pub fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop background tasks, fail everything in flight, remove every
    /// registration and clear the catalog.
    pub fn shutdown(&self) {
        info!("Shutting down tab hub");
        self.shutdown_token.cancel();

        let reopens = self
            .reopens
            .fail_all(ReopenError::Aborted("tab hub shutting down".to_string()));
        let requests = self.correlator.reject_all("tab hub shutting down");

        let mut state = self.state.lock();
        let tools = state.registered.len() + state.extension.len();
        for (_, tool) in state.registered.drain() {
            tool.handle.remove();
        }
        for (_, tool) in state.extension.drain() {
            tool.handle.remove();
        }
        state.catalog.clear();

        info!(
            reopens = reopens,
            requests = requests,
            tools = tools,
            "Tab hub shutdown complete"
        );
    }
}

/// Server-side config of a catalog tool.
fn catalog_tool_config(name: &str, domain: &str, status: TabStatus, tool: &ToolDescriptor) -> Tool {
    Tool {
        name: Cow::Owned(name.to_string()),
        title: tool.title.clone(),
        description: Some(Cow::Owned(describe_tool(domain, status, &tool.description))),
        input_schema: Arc::new(tool.input_schema.clone()),
        output_schema: tool.output_schema.clone().map(Arc::new),
        annotations: Some(tool.annotations.to_rmcp(tool.title.as_deref())),
        icons: None,
    }
}

fn no_arguments_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), json!({}));
    schema.insert("additionalProperties".to_string(), json!(false));
    schema
}

/// Keep the first descriptor of each name.
fn dedupe_tools(tools: Vec<ToolDescriptor>, key: &CatalogKey) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| {
            let fresh = seen.insert(tool.name.clone());
            if !fresh {
                warn!(source = %key, tool = %tool.name, "Duplicate tool in announcement");
            }
            fresh
        })
        .collect()
}

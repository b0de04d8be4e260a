//! Common test utilities for hub integration tests
//!
//! In-memory fakes of the MCP server, the browser tab platform and tab
//! channels.

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tab_hub::{
    HubConfig, HubError, HubMessage, HubResult, InvocationMeta, TabHub, TabId, TabInfo,
    TabMessage, TabPlatform, TabPort, Tool, ToolAnnotations, ToolDescriptor, ToolHandler,
    ToolRegistration, ToolResult, ToolServer,
};
use tokio::sync::mpsc;

// ============================================================================
// Fake MCP server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Registered(String),
    Updated(String),
    Removed(String),
}

struct ServerTool {
    config: Tool,
    handler: ToolHandler,
}

#[derive(Default)]
struct ServerState {
    tools: HashMap<String, ServerTool>,
    events: Vec<ServerEvent>,
}

/// Records every registration and refuses duplicate names, like a real
/// MCP server would.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl ToolServer for FakeServer {
    fn register_tool(
        &self,
        name: &str,
        config: Tool,
        handler: ToolHandler,
    ) -> HubResult<Box<dyn ToolRegistration>> {
        let mut state = self.state.lock();
        if state.tools.contains_key(name) {
            return Err(HubError::Registration {
                name: name.to_string(),
                reason: "duplicate tool name".to_string(),
            });
        }
        state
            .tools
            .insert(name.to_string(), ServerTool { config, handler });
        state.events.push(ServerEvent::Registered(name.to_string()));
        Ok(Box::new(FakeRegistration {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeRegistration {
    name: String,
    state: Arc<Mutex<ServerState>>,
}

impl ToolRegistration for FakeRegistration {
    fn update(&self, config: Tool) -> HubResult<()> {
        let mut state = self.state.lock();
        let tool = state
            .tools
            .get_mut(&self.name)
            .ok_or_else(|| HubError::Registration {
                name: self.name.clone(),
                reason: "not registered".to_string(),
            })?;
        tool.config = config;
        state.events.push(ServerEvent::Updated(self.name.clone()));
        Ok(())
    }

    fn remove(&self) {
        let mut state = self.state.lock();
        if state.tools.remove(&self.name).is_some() {
            state.events.push(ServerEvent::Removed(self.name.clone()));
        }
    }
}

impl FakeServer {
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.lock().tools.contains_key(name)
    }

    pub fn description(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .tools
            .get(name)
            .and_then(|tool| tool.config.description.as_deref().map(str::to_string))
    }

    pub fn events(&self) -> Vec<ServerEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Invoke a registered tool the way an MCP client would.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        let handler = {
            let state = self.state.lock();
            let tool = state
                .tools
                .get(name)
                .unwrap_or_else(|| panic!("tool '{}' is not registered", name));
            Arc::clone(&tool.handler)
        };
        handler(args, InvocationMeta::default()).await
    }
}

// ============================================================================
// Fake tab platform
// ============================================================================

struct PlatformState {
    active: Option<TabId>,
    tabs: HashMap<TabId, TabInfo>,
    next_tab_id: TabId,
    created: Vec<String>,
    focused: Vec<TabId>,
    fail_create: bool,
}

/// Tabs live in a map; created tabs get ids from 100 upwards.
#[derive(Clone)]
pub struct FakePlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                active: None,
                tabs: HashMap::new(),
                next_tab_id: 100,
                created: Vec::new(),
                focused: Vec::new(),
                fail_create: false,
            })),
        }
    }
}

#[async_trait]
impl TabPlatform for FakePlatform {
    async fn active_tab(&self) -> HubResult<Option<TabInfo>> {
        let state = self.state.lock();
        Ok(state.active.and_then(|id| state.tabs.get(&id).cloned()))
    }

    async fn get_tab(&self, tab_id: TabId) -> HubResult<TabInfo> {
        self.state
            .lock()
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| HubError::Platform(format!("No tab with id: {}", tab_id)))
    }

    async fn create_tab(&self, url: &str) -> HubResult<TabInfo> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(HubError::Platform("tab creation blocked".to_string()));
        }
        let tab = TabInfo::new(state.next_tab_id, url);
        state.next_tab_id += 1;
        state.tabs.insert(tab.id, tab.clone());
        state.created.push(url.to_string());
        Ok(tab)
    }

    async fn focus_tab(&self, tab_id: TabId) -> HubResult<()> {
        let mut state = self.state.lock();
        if !state.tabs.contains_key(&tab_id) {
            return Err(HubError::Platform(format!("No tab with id: {}", tab_id)));
        }
        state.focused.push(tab_id);
        Ok(())
    }
}

impl FakePlatform {
    pub fn add_tab(&self, tab_id: TabId, url: &str) {
        self.state
            .lock()
            .tabs
            .insert(tab_id, TabInfo::new(tab_id, url));
    }

    pub fn set_active(&self, tab_id: Option<TabId>) {
        self.state.lock().active = tab_id;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    pub fn focused(&self) -> Vec<TabId> {
        self.state.lock().focused.clone()
    }
}

// ============================================================================
// Tab channels
// ============================================================================

/// The tab side of one channel, driven directly through the hub.
pub struct TestTab {
    pub port: Arc<TabPort>,
    pub outbound: mpsc::UnboundedReceiver<HubMessage>,
}

pub fn open_tab(hub: &TabHub, tab_id: TabId, url: &str) -> TestTab {
    let (tx, outbound) = mpsc::unbounded_channel();
    let port = hub.open_port(&TabInfo::new(tab_id, url), Arc::new(tx));
    TestTab { port, outbound }
}

impl TestTab {
    pub async fn announce(&self, hub: &TabHub, tools: Vec<ToolDescriptor>) {
        hub.handle_message(&self.port, TabMessage::AnnounceTools { tools })
            .await;
    }

    pub async fn change(&self, hub: &TabHub, tools: Vec<ToolDescriptor>) {
        hub.handle_message(&self.port, TabMessage::ToolsChanged { tools })
            .await;
    }

    pub async fn reply(&self, hub: &TabHub, request_id: &str, data: Value) {
        hub.handle_message(
            &self.port,
            TabMessage::Result {
                request_id: request_id.to_string(),
                data,
            },
        )
        .await;
    }

    pub fn disconnect(&self, hub: &TabHub) {
        hub.handle_disconnect(&self.port);
    }

    /// Next invocation sent to this tab, skipping refresh requests.
    pub async fn next_invoke(&mut self) -> (String, String, Value) {
        loop {
            match self.outbound.recv().await {
                Some(HubMessage::Invoke {
                    request_id,
                    tool_name,
                    args,
                }) => return (request_id, tool_name, args),
                Some(HubMessage::RefreshRequest) => continue,
                None => panic!("channel closed before an invocation arrived"),
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn hub_with(config: HubConfig) -> (Arc<TabHub>, FakeServer, FakePlatform) {
    let server = FakeServer::default();
    let platform = FakePlatform::default();
    let hub = TabHub::new(config, Arc::new(server.clone()), Arc::new(platform.clone()))
        .expect("valid hub config");
    (hub, server, platform)
}

pub fn hub() -> (Arc<TabHub>, FakeServer, FakePlatform) {
    hub_with(HubConfig::default())
}

pub fn tool(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, format!("{} tool", name))
}

pub fn cacheable(name: &str) -> ToolDescriptor {
    tool(name).with_annotations(ToolAnnotations::new().with_cacheable(true))
}

/// Yield to spawned tasks until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

//! Core types for the tool catalog.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Weak},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{annotations::ToolAnnotations, channel::TabPort, platform::TabId};

/// A tool as announced by a tab. Superseded wholesale by re-announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Map<String, Value>>,
    #[serde(default)]
    pub annotations: ToolAnnotations,
}

fn empty_object_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            input_schema: empty_object_schema(),
            output_schema: None,
            annotations: ToolAnnotations::default(),
        }
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Map<String, Value>) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn is_cacheable(&self) -> bool {
        self.annotations.cacheable
    }
}

/// Identity of the data source behind a catalog entry: `tab-<id>` for a live
/// tab, `cached-<timestamp>` for a snapshot kept after the tab closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSourceId {
    Tab(TabId),
    Cached(i64),
}

impl DataSourceId {
    pub fn is_cached(&self) -> bool {
        matches!(self, DataSourceId::Cached(_))
    }

    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            DataSourceId::Tab(id) => Some(*id),
            DataSourceId::Cached(_) => None,
        }
    }

    /// Segment used inside synthesized external tool names.
    pub fn name_segment(&self) -> String {
        match self {
            DataSourceId::Tab(id) => format!("tab{}", id),
            DataSourceId::Cached(ts) => format!("cached{}", ts),
        }
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceId::Tab(id) => write!(f, "tab-{}", id),
            DataSourceId::Cached(ts) => write!(f, "cached-{}", ts),
        }
    }
}

impl FromStr for DataSourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("tab-") {
            return id
                .parse()
                .map(DataSourceId::Tab)
                .map_err(|e| format!("invalid tab id in '{}': {}", s, e));
        }
        if let Some(ts) = s.strip_prefix("cached-") {
            return ts
                .parse()
                .map(DataSourceId::Cached)
                .map_err(|e| format!("invalid cache timestamp in '{}': {}", s, e));
        }
        Err(format!("unknown data source id '{}'", s))
    }
}

impl TryFrom<String> for DataSourceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataSourceId> for String {
    fn from(value: DataSourceId) -> Self {
        value.to_string()
    }
}

/// Unique catalog location: `(domain, data source)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    pub domain: String,
    pub data_id: DataSourceId,
}

impl CatalogKey {
    pub fn new(domain: impl Into<String>, data_id: DataSourceId) -> Self {
        Self {
            domain: domain.into(),
            data_id,
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.data_id)
    }
}

/// Tools announced by one data source on one domain.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub domain: String,
    pub tools: Vec<ToolDescriptor>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
    /// Present only for live entries.
    pub tab_id: Option<TabId>,
    /// Present only for live entries. Weak: the serving task owns the port.
    pub channel: Option<Weak<TabPort>>,
    pub closed: bool,
}

impl CatalogEntry {
    pub fn live(port: &Arc<TabPort>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            domain: port.domain().to_string(),
            tools,
            updated_at: Utc::now(),
            url: port.url().to_string(),
            tab_id: Some(port.tab_id()),
            channel: Some(Arc::downgrade(port)),
            closed: false,
        }
    }

    /// Closed snapshot keeping only the given tools, without tab or channel.
    pub fn cached(domain: impl Into<String>, url: impl Into<String>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            domain: domain.into(),
            tools,
            updated_at: Utc::now(),
            url: url.into(),
            tab_id: None,
            channel: None,
            closed: true,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.closed && self.tab_id.is_some()
    }

    /// The channel, if it is still being served.
    pub fn port(&self) -> Option<Arc<TabPort>> {
        self.channel.as_ref().and_then(Weak::upgrade)
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn cacheable_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().filter(|t| t.is_cacheable()).cloned().collect()
    }
}

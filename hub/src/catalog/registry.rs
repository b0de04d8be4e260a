//! Domain-keyed catalog registry.
//!
//! Maps domain -> data source -> [`CatalogEntry`]. Pure data structure; the
//! hub owns the only instance and mutates it under its state lock, so each
//! multi-step update is observed whole.

use std::collections::HashMap;

use super::types::{CatalogEntry, DataSourceId};
use crate::platform::TabId;

#[derive(Debug, Default)]
pub struct CatalogRegistry {
    domains: HashMap<String, HashMap<DataSourceId, CatalogEntry>>,
}

/// Aggregate sizes: `(domains, entries, tools)`.
pub type RegistryCounts = (usize, usize, usize);

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-domain map, created on first reference.
    pub fn get_or_create_domain(&mut self, domain: &str) -> &mut HashMap<DataSourceId, CatalogEntry> {
        self.domains.entry(domain.to_string()).or_default()
    }

    pub fn domain(&self, domain: &str) -> Option<&HashMap<DataSourceId, CatalogEntry>> {
        self.domains.get(domain)
    }

    /// Insert or replace an entry, returning the previous one.
    pub fn upsert_entry(
        &mut self,
        domain: &str,
        data_id: DataSourceId,
        entry: CatalogEntry,
    ) -> Option<CatalogEntry> {
        self.get_or_create_domain(domain).insert(data_id, entry)
    }

    /// Remove an entry. The domain map itself is kept.
    pub fn remove_entry(&mut self, domain: &str, data_id: &DataSourceId) -> Option<CatalogEntry> {
        self.domains.get_mut(domain)?.remove(data_id)
    }

    pub fn get_entry(&self, domain: &str, data_id: &DataSourceId) -> Option<&CatalogEntry> {
        self.domains.get(domain)?.get(data_id)
    }

    /// Live entry for a tab on any domain.
    pub fn find_live_tab(&self, tab_id: TabId) -> Option<(&str, &CatalogEntry)> {
        let data_id = DataSourceId::Tab(tab_id);
        self.domains.iter().find_map(|(domain, entries)| {
            entries
                .get(&data_id)
                .filter(|entry| !entry.closed)
                .map(|entry| (domain.as_str(), entry))
        })
    }

    /// Fresh cached id for `domain`, bumped past any snapshot already taken in
    /// the same millisecond.
    pub fn next_cached_id(&self, domain: &str, now_ms: i64) -> DataSourceId {
        let mut ts = now_ms;
        if let Some(entries) = self.domains.get(domain) {
            while entries.contains_key(&DataSourceId::Cached(ts)) {
                ts += 1;
            }
        }
        DataSourceId::Cached(ts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataSourceId, &CatalogEntry)> {
        self.domains.iter().flat_map(|(domain, entries)| {
            entries
                .iter()
                .map(move |(data_id, entry)| (domain.as_str(), data_id, entry))
        })
    }

    pub fn counts(&self) -> RegistryCounts {
        let entries = self.domains.values().map(HashMap::len).sum();
        let tools = self
            .domains
            .values()
            .flat_map(HashMap::values)
            .map(|e| e.tools.len())
            .sum();
        (self.domains.len(), entries, tools)
    }

    pub fn clear(&mut self) {
        self.domains.clear();
    }
}

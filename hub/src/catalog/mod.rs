//! Tool catalogs grouped by domain and data source.
//!
//! - [`types`]: descriptors, data-source ids and catalog entries
//! - [`registry`]: the domain-keyed store the hub mutates

pub mod registry;
pub mod types;

pub use registry::{CatalogRegistry, RegistryCounts};
pub use types::{CatalogEntry, CatalogKey, DataSourceId, ToolDescriptor};

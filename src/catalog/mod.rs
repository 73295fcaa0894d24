//! Configured catalog
//!
//! Loads the configured catalog and turns each stream into a validated
//! [`StreamConfig`]. Configuration errors (missing or duplicate primary key,
//! references to undeclared columns, unsupported nested keys, two streams
//! sharing a table) are reported here, before the destination is touched.

mod parser;
mod types;

pub use parser::{load_catalog, load_catalog_from_str, CatalogParser};
pub use types::{
    CatalogStream, ConfiguredCatalog, ConfiguredStream, ParsedCatalog, StreamConfig,
    StreamConfigBuilder, CDC_DELETED_AT,
};

#[cfg(test)]
mod tests;

//! Identifier resolution
//!
//! Turns source stream and field names into destination identifiers.
//! Normalization is case folding, then truncation to the dialect's maximum
//! identifier length; quoting is applied later by the dialect to every
//! identifier. Names that collide after normalization are suffixed in
//! declaration order.

mod resolver;
mod types;

pub use resolver::{
    IdentifierResolver, COLUMN_DATA, COLUMN_EXTRACTED_AT, COLUMN_LOADED_AT, COLUMN_META,
    COLUMN_RAW_ID, FINAL_SYSTEM_COLUMNS,
};
pub use types::{CaseFolding, ColumnId, NamingConvention, StreamId, TableRef};

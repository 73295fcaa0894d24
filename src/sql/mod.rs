//! SQL generation
//!
//! [`Sql`] is the unit handed to a destination driver: an ordered list of
//! transactions. [`SqlGenerator`] builds every statement the engine runs,
//! using a [`SqlDialect`](crate::dialect::SqlDialect) for quoting, types and
//! JSON access.

mod generator;
mod types;

pub use generator::{SqlGenerator, SOFT_RESET_SUFFIX, STATE_TABLE};
pub use types::Sql;

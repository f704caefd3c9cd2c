//! Configuration types for source strategies.
//!
//! - `SourceConfig`: persisted per-source settings
//! - `ConnectionConfig`: relational connection limits parsed from a URL

mod connection;
mod source;

pub use connection::ConnectionConfig;
pub use source::{AUTO_DELIMITER, SourceConfig};

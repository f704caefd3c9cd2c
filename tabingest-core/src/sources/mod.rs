//! Source strategies and factory for unified tabular access.
//!
//! Every supported source kind is read through the [`SourceStrategy`] trait,
//! which yields a [`SourceSchema`] and a [`NormalizedFrame`] regardless of the
//! underlying format.
//!
//! # Module Structure
//! - `config`: Configuration types (SourceConfig, ConnectionConfig)
//! - `helpers`: Shared file reading, decoding and type inference
//! - One module per strategy (delimited, spreadsheet, json, plain_text,
//!   sql_dump, relational)

use async_trait::async_trait;

use crate::error::IngestError;
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

pub mod config;
pub(crate) mod helpers;

pub mod delimited;
pub mod json;
pub mod plain_text;
pub mod relational;
#[cfg(feature = "spreadsheet")]
pub mod spreadsheet;
pub mod sql_dump;

pub use config::{AUTO_DELIMITER, ConnectionConfig, SourceConfig};
pub use delimited::DelimitedFileStrategy;
pub use json::JsonStrategy;
pub use plain_text::PlainTextStrategy;
pub use relational::DatabaseEngine;
#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub use relational::RelationalStrategy;
#[cfg(feature = "spreadsheet")]
pub use spreadsheet::SpreadsheetStrategy;
pub use sql_dump::SqlDumpStrategy;

/// Main trait for source strategies with object-safe design.
///
/// # Lifecycle
/// `connect` is idempotent. `get_schema` and `get_data` connect implicitly.
/// `disconnect` releases buffered data or pooled connections and may be
/// called repeatedly. Methods take `&mut self`, so one instance is never
/// used concurrently.
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn SourceStrategy>`.
#[async_trait]
pub trait SourceStrategy: Send {
    /// Opens the source and loads whatever the strategy buffers.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or decoded, or the database
    /// cannot be reached
    async fn connect(&mut self) -> Result<()>;

    /// Describes the tables exposed by the source.
    async fn get_schema(&mut self) -> Result<SourceSchema>;

    /// Returns rows from the source, at most `limit` when given.
    async fn get_data(&mut self, limit: Option<usize>) -> Result<NormalizedFrame>;

    /// Releases buffers and connections.
    async fn disconnect(&mut self) -> Result<()>;

    /// Returns the source kind this strategy handles.
    fn source_kind(&self) -> SourceKind;

    /// True between a successful `connect` and `disconnect`.
    fn is_connected(&self) -> bool;
}

/// Creates the strategy for a source kind tag.
///
/// The tag is resolved case-insensitively through [`SourceKind::from_tag`];
/// `config.source_kind` is not consulted.
///
/// # Errors
/// Returns error if:
/// - The kind is unknown (`UnsupportedSourceKind`)
/// - The kind's driver is not compiled in (`DriverUnavailable`)
/// - A relational connection string names no recognizable engine
pub fn create_strategy(kind: &str, config: SourceConfig) -> Result<Box<dyn SourceStrategy>> {
    let source_kind =
        SourceKind::from_tag(kind).ok_or_else(|| IngestError::unsupported_kind(kind))?;

    tracing::debug!("Creating {} strategy for {}", source_kind, config);

    match source_kind {
        SourceKind::DelimitedFile => Ok(Box::new(DelimitedFileStrategy::new(config))),
        SourceKind::Json => Ok(Box::new(JsonStrategy::new(config))),
        SourceKind::PlainText => Ok(Box::new(PlainTextStrategy::new(config))),
        SourceKind::SqlDump => Ok(Box::new(SqlDumpStrategy::new(config))),
        SourceKind::Spreadsheet => {
            #[cfg(feature = "spreadsheet")]
            {
                Ok(Box::new(SpreadsheetStrategy::new(config)))
            }
            #[cfg(not(feature = "spreadsheet"))]
            {
                Err(IngestError::driver_unavailable(kind, "calamine (feature `spreadsheet`)"))
            }
        }
        SourceKind::RelationalConnection => create_relational(kind, config),
    }
}

/// Creates a strategy using the kind stored in the configuration.
pub fn create_strategy_from_config(config: SourceConfig) -> Result<Box<dyn SourceStrategy>> {
    let kind = config.source_kind.clone();
    create_strategy(&kind, config)
}

fn create_relational(kind: &str, config: SourceConfig) -> Result<Box<dyn SourceStrategy>> {
    let connection_string = config.connection_string.as_deref().ok_or_else(|| {
        IngestError::configuration("connection_string is required for database sources")
    })?;
    let engine = DatabaseEngine::detect(connection_string, kind)?;

    match engine {
        #[cfg(feature = "postgresql")]
        DatabaseEngine::Postgres => Ok(Box::new(RelationalStrategy::new(engine, config)?)),
        #[cfg(not(feature = "postgresql"))]
        DatabaseEngine::Postgres => Err(IngestError::driver_unavailable(
            kind,
            "sqlx (feature `postgresql`)",
        )),
        #[cfg(feature = "mysql")]
        DatabaseEngine::MySql => Ok(Box::new(RelationalStrategy::new(engine, config)?)),
        #[cfg(not(feature = "mysql"))]
        DatabaseEngine::MySql => Err(IngestError::driver_unavailable(
            kind,
            "sqlx (feature `mysql`)",
        )),
        #[cfg(feature = "sqlite")]
        DatabaseEngine::Sqlite => Ok(Box::new(RelationalStrategy::new(engine, config)?)),
        #[cfg(not(feature = "sqlite"))]
        DatabaseEngine::Sqlite => Err(IngestError::driver_unavailable(
            kind,
            "sqlx (feature `sqlite`)",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_resolves_aliases() {
        let cases = [
            ("csv", SourceKind::DelimitedFile),
            ("DELIMITED", SourceKind::DelimitedFile),
            ("json", SourceKind::Json),
            ("Text", SourceKind::PlainText),
            ("plain_text", SourceKind::PlainText),
            ("dump", SourceKind::SqlDump),
        ];
        for (tag, expected) in cases {
            let strategy = create_strategy(tag, SourceConfig::file(tag, "unused")).unwrap();
            assert_eq!(strategy.source_kind(), expected, "tag {}", tag);
            assert!(!strategy.is_connected());
        }
    }

    #[test]
    fn test_factory_rejects_unknown_kind() {
        let error = create_strategy("parquet", SourceConfig::file("parquet", "x")).err();
        assert!(matches!(
            error,
            Some(IngestError::UnsupportedSourceKind { ref kind }) if kind == "parquet"
        ));
    }

    #[test]
    fn test_factory_requires_connection_string() {
        let config = SourceConfig {
            source_kind: "postgresql".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_strategy("postgresql", config).err(),
            Some(IngestError::Configuration { .. })
        ));
    }

    #[cfg(feature = "spreadsheet")]
    #[test]
    fn test_factory_spreadsheet_aliases() {
        for tag in ["excel", "xlsx", "xls", "spreadsheet"] {
            let strategy = create_strategy(tag, SourceConfig::file(tag, "book.xlsx")).unwrap();
            assert_eq!(strategy.source_kind(), SourceKind::Spreadsheet);
        }
    }

    #[cfg(not(feature = "spreadsheet"))]
    #[test]
    fn test_factory_spreadsheet_driver_unavailable() {
        let error = create_strategy("excel", SourceConfig::file("excel", "book.xlsx")).err();
        assert!(matches!(error, Some(IngestError::DriverUnavailable { .. })));
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_factory_mysql_driver_unavailable() {
        let config = SourceConfig::database("mysql", "mysql://u:p@localhost/db");
        let error = create_strategy("mysql", config).err();
        assert!(matches!(
            error,
            Some(IngestError::DriverUnavailable { ref dependency, .. }) if dependency.contains("mysql")
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_factory_sqlite_from_path() {
        let config = SourceConfig::database("database", "/tmp/app.sqlite3");
        let strategy = create_strategy("database", config).unwrap();
        assert_eq!(strategy.source_kind(), SourceKind::RelationalConnection);
        assert!(!strategy.is_connected());
    }

    #[test]
    fn test_create_from_config_uses_stored_kind() {
        let strategy = create_strategy_from_config(SourceConfig::file("sql", "dump.sql")).unwrap();
        assert_eq!(strategy.source_kind(), SourceKind::SqlDump);
    }
}

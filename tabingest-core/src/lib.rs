//! Core data structures and source strategies for tabingest.
//!
//! This crate turns heterogeneous tabular sources (delimited files,
//! spreadsheets, JSON documents, plain text, SQL dump files and live
//! relational databases) into one normalized shape: a [`SourceSchema`]
//! describing tables and columns, and a [`NormalizedFrame`] of rows.
//!
//! # Architecture
//! - `dump`: SQL dump parser (encoding resolution, statement scanning, a
//!   staged document state machine)
//! - `sources`: one [`SourceStrategy`] per source kind, built by
//!   [`create_strategy`]
//! - `sync`: [`SyncOrchestrator`] refreshing registered sources into a
//!   [`RowSink`] with large/binary column redaction
//!
//! # Security Guarantees
//! - Connection strings are redacted before reaching errors or logs
//! - Database connections are opened read-only where supported

pub mod dump;
pub mod error;
pub mod logging;
pub mod models;
pub mod sources;
pub mod sync;

// Re-export commonly used types
pub use dump::{DumpDocument, DumpState};
pub use error::{IngestError, Result, redact_connection_url};
pub use logging::init_logging;
pub use models::{
    ColumnDescriptor, GenericType, NormalizedFrame, Row, SOURCE_TABLE_COLUMN, SourceKind,
    SourceSchema, TableDescriptor,
};
pub use sources::{
    ConnectionConfig, SourceConfig, SourceStrategy, create_strategy, create_strategy_from_config,
};
pub use sync::{
    FileSourceRegistry, JsonFileRowSink, MemoryRowStore, MemorySourceRegistry, RowSink,
    SourceRecord, SourceRegistry, StoredRow, SyncConfig, SyncOrchestrator, SyncOutcome,
};

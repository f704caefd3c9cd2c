//! Sync orchestration: refresh a registered source into a row sink.
//!
//! # Module Structure
//! - `registry`: `SourceRegistry` and its memory and file implementations
//! - `sink`: `RowSink` and its memory and JSON-file implementations
//! - `redaction`: large/binary column detection and placeholders

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::models::{SourceKind, SourceSchema};
use crate::sources::create_strategy_from_config;
use crate::Result;

pub mod redaction;
pub mod registry;
pub mod sink;

pub use registry::{FileSourceRegistry, MemorySourceRegistry, SourceRecord, SourceRegistry};
pub use sink::{JsonFileRowSink, MemoryRowStore, RowSink, StoredRow};

/// Settings for sync runs.
///
/// # Example
/// ```rust
/// use tabingest_core::sync::SyncConfig;
///
/// let config = SyncConfig::new()
///     .with_redaction_threshold_bytes(4096)
///     .with_database_row_limit(500);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Values longer than this many bytes count as large
    pub redaction_threshold_bytes: usize,
    /// Non-null values sampled per column for redaction
    pub redaction_sample_size: usize,
    /// Row cap for relational sources
    pub database_row_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            redaction_threshold_bytes: 10 * 1024,
            redaction_sample_size: 10,
            database_row_limit: 1000,
        }
    }
}

impl SyncConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the large-value threshold.
    pub fn with_redaction_threshold_bytes(mut self, bytes: usize) -> Self {
        self.redaction_threshold_bytes = bytes;
        self
    }

    /// Builder method to set the per-column sample size.
    pub fn with_redaction_sample_size(mut self, size: usize) -> Self {
        self.redaction_sample_size = size;
        self
    }

    /// Builder method to set the relational row cap.
    pub fn with_database_row_limit(mut self, limit: usize) -> Self {
        self.database_row_limit = limit;
        self
    }

    /// Validates sync settings.
    ///
    /// # Errors
    /// Returns error if any setting is zero or the sample size exceeds 1000
    pub fn validate(&self) -> Result<()> {
        if self.redaction_threshold_bytes == 0 {
            return Err(IngestError::configuration(
                "redaction_threshold_bytes must be greater than 0",
            ));
        }

        if self.redaction_sample_size == 0 || self.redaction_sample_size > 1000 {
            return Err(IngestError::configuration(
                "redaction_sample_size must be between 1 and 1000",
            ));
        }

        if self.database_row_limit == 0 {
            return Err(IngestError::configuration(
                "database_row_limit must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Row limit applied when reading a source of `kind`.
    pub fn row_limit_for(&self, kind: SourceKind) -> Option<usize> {
        (kind == SourceKind::RelationalConnection).then_some(self.database_row_limit)
    }
}

/// Result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Registry identifier of the synced source
    pub source_id: u64,
    /// Whether rows were stored
    pub success: bool,
    /// Rows written to the sink
    pub rows_updated: usize,
    /// Refreshed schema, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SourceSchema>,
    /// Human-readable result or failure reason
    pub message: String,
    /// Columns replaced by placeholders
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redacted_columns: Vec<String>,
}

impl SyncOutcome {
    fn failure(source_id: u64, error: &IngestError) -> Self {
        let message = if error.is_source_unreadable() {
            format!("Source unreadable: {}", error)
        } else {
            error.to_string()
        };
        Self {
            source_id,
            success: false,
            rows_updated: 0,
            schema: None,
            message,
            redacted_columns: Vec::new(),
        }
    }
}

/// Refreshes registered sources into a row sink.
///
/// Each sync builds a fresh strategy, reads the source, redacts large or
/// binary columns and replaces the stored rows in one call. Failures leave
/// previously stored rows untouched.
pub struct SyncOrchestrator {
    registry: Arc<dyn SourceRegistry>,
    sink: Arc<dyn RowSink>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Creates an orchestrator over `registry` that writes rows to `sink`.
    pub fn new(registry: Arc<dyn SourceRegistry>, sink: Arc<dyn RowSink>) -> Self {
        Self {
            registry,
            sink,
            config: SyncConfig::default(),
        }
    }

    /// Builder method to replace the sync configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Active sync configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronizes one source.
    ///
    /// Never returns an error: failures are reported through
    /// `SyncOutcome::success`. The registry's `last_synced` is updated for
    /// every attempt on a known source.
    pub async fn sync(&self, source_id: u64) -> SyncOutcome {
        let record = match self.registry.get(source_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Sync of source {} failed: {}", source_id, e);
                return SyncOutcome::failure(source_id, &e);
            }
        };

        let outcome = if record.active {
            match self.run(&record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Sync of source {} failed: {}", source_id, e);
                    SyncOutcome::failure(source_id, &e)
                }
            }
        } else {
            SyncOutcome::failure(
                source_id,
                &IngestError::configuration(format!("Source {} is inactive", source_id)),
            )
        };

        if let Err(e) = self.registry.mark_synced(source_id, Utc::now()).await {
            tracing::warn!("Failed to record sync time for source {}: {}", source_id, e);
        }
        outcome
    }

    /// Synchronizes every active source in the registry, in id order.
    ///
    /// # Errors
    /// Returns error only if the registry cannot be listed
    pub async fn sync_all(&self) -> Result<Vec<SyncOutcome>> {
        let mut outcomes = Vec::new();
        for record in self.registry.list().await? {
            if record.active {
                outcomes.push(self.sync(record.id).await);
            }
        }
        Ok(outcomes)
    }

    async fn run(&self, record: &SourceRecord) -> Result<SyncOutcome> {
        self.config.validate()?;
        record.config.validate()?;

        let mut strategy = create_strategy_from_config(record.config.clone())?;
        let limit = self.config.row_limit_for(strategy.source_kind());

        tracing::info!("Syncing source {} ({})", record.id, record.config);

        let read = async {
            let schema = strategy.get_schema().await?;
            let frame = strategy.get_data(limit).await?;
            Ok::<_, IngestError>((schema, frame))
        }
        .await;

        if let Err(e) = strategy.disconnect().await {
            tracing::warn!("Failed to release source {}: {}", record.id, e);
        }
        let (schema, mut frame) = read?;

        let redacted_columns = redaction::redact_frame(
            &mut frame,
            self.config.redaction_sample_size,
            self.config.redaction_threshold_bytes,
        );

        let rows: Vec<StoredRow> = frame
            .to_records()
            .into_iter()
            .enumerate()
            .map(|(index, data)| StoredRow::new(index, data))
            .collect();

        let rows_updated = self.sink.replace_rows(record.id, rows).await?;

        let mut message = format!(
            "Synced {} rows from {} source {}",
            rows_updated,
            strategy.source_kind(),
            record.id
        );
        if !redacted_columns.is_empty() {
            message.push_str(&format!("; redacted columns: {}", redacted_columns.join(", ")));
        }
        tracing::info!("{}", message);

        Ok(SyncOutcome {
            source_id: record.id,
            success: true,
            rows_updated,
            schema: Some(schema),
            message,
            redacted_columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceConfig;

    #[test]
    fn test_sync_config_defaults_and_validation() {
        let config = SyncConfig::default();
        assert_eq!(config.redaction_threshold_bytes, 10 * 1024);
        assert_eq!(config.redaction_sample_size, 10);
        assert_eq!(config.database_row_limit, 1000);
        assert!(config.validate().is_ok());

        assert!(SyncConfig::new().with_redaction_threshold_bytes(0).validate().is_err());
        assert!(SyncConfig::new().with_redaction_sample_size(0).validate().is_err());
        assert!(SyncConfig::new().with_database_row_limit(0).validate().is_err());
    }

    #[test]
    fn test_row_limit_only_for_relational() {
        let config = SyncConfig::new().with_database_row_limit(50);
        assert_eq!(config.row_limit_for(SourceKind::RelationalConnection), Some(50));
        assert_eq!(config.row_limit_for(SourceKind::DelimitedFile), None);
        assert_eq!(config.row_limit_for(SourceKind::SqlDump), None);
    }

    #[test]
    fn test_sync_config_partial_deserialize() {
        let config: SyncConfig = serde_json::from_str(r#"{"database_row_limit": 5}"#).unwrap();
        assert_eq!(config.database_row_limit, 5);
        assert_eq!(config.redaction_sample_size, 10);
    }

    #[tokio::test]
    async fn test_unknown_source_fails_without_error() {
        let orchestrator = SyncOrchestrator::new(
            Arc::new(MemorySourceRegistry::new()),
            Arc::new(MemoryRowStore::new()),
        );

        let outcome = orchestrator.sync(42).await;
        assert!(!outcome.success);
        assert_eq!(outcome.rows_updated, 0);
        assert!(outcome.message.contains("42"));
    }

    #[tokio::test]
    async fn test_inactive_source_is_rejected_and_stamped() {
        let registry = Arc::new(MemorySourceRegistry::from_records([SourceRecord::new(
            1,
            "old",
            SourceConfig::file("csv", "missing.csv"),
        )
        .with_active(false)]));
        let orchestrator = SyncOrchestrator::new(registry.clone(), Arc::new(MemoryRowStore::new()));

        let outcome = orchestrator.sync(1).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("inactive"));
        assert!(registry.get(1).await.unwrap().last_synced.is_some());
    }

    #[tokio::test]
    async fn test_unreadable_source_reports_failure() {
        let registry = Arc::new(MemorySourceRegistry::from_records([SourceRecord::new(
            1,
            "gone",
            SourceConfig::file("csv", "/nonexistent/tabingest/gone.csv"),
        )]));
        let store = Arc::new(MemoryRowStore::new());
        let orchestrator = SyncOrchestrator::new(registry.clone(), store.clone());

        let outcome = orchestrator.sync(1).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Source unreadable"));
        assert_eq!(store.row_count(1).await, 0);
        assert!(registry.get(1).await.unwrap().last_synced.is_some());
    }
}

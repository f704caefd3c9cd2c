//! Source registries holding persisted `SourceConfig`s.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::sink::write_atomically;
use crate::error::IngestError;
use crate::sources::SourceConfig;
use crate::Result;

/// A registered data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub config: SourceConfig,
    /// Inactive sources are rejected by the orchestrator
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl SourceRecord {
    pub fn new(id: u64, name: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            id,
            name: name.into(),
            config,
            active: true,
            last_synced: None,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Lookup and bookkeeping for registered sources.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Returns the record for a source.
    ///
    /// # Errors
    /// Returns `SourceNotFound` for unknown ids.
    async fn get(&self, source_id: u64) -> Result<SourceRecord>;

    /// Every registered source, ordered by id.
    async fn list(&self) -> Result<Vec<SourceRecord>>;

    /// Records the time of the latest sync attempt.
    async fn mark_synced(&self, source_id: u64, at: DateTime<Utc>) -> Result<()>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemorySourceRegistry {
    sources: RwLock<BTreeMap<u64, SourceRecord>>,
}

impl MemorySourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        Self {
            sources: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Adds or replaces a record.
    pub async fn insert(&self, record: SourceRecord) {
        self.sources.write().await.insert(record.id, record);
    }
}

#[async_trait]
impl SourceRegistry for MemorySourceRegistry {
    async fn get(&self, source_id: u64) -> Result<SourceRecord> {
        self.sources
            .read()
            .await
            .get(&source_id)
            .cloned()
            .ok_or(IngestError::SourceNotFound { source_id })
    }

    async fn list(&self) -> Result<Vec<SourceRecord>> {
        Ok(self.sources.read().await.values().cloned().collect())
    }

    async fn mark_synced(&self, source_id: u64, at: DateTime<Utc>) -> Result<()> {
        let mut sources = self.sources.write().await;
        let record = sources
            .get_mut(&source_id)
            .ok_or(IngestError::SourceNotFound { source_id })?;
        record.last_synced = Some(at);
        Ok(())
    }
}

/// On-disk layout of a registry file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    sources: Vec<SourceRecord>,
}

/// Registry backed by a JSON file of the form `{"sources": [...]}`.
///
/// The file is read once on open and rewritten on every change.
#[derive(Debug)]
pub struct FileSourceRegistry {
    path: PathBuf,
    sources: RwLock<BTreeMap<u64, SourceRecord>>,
}

impl FileSourceRegistry {
    /// Opens the registry, starting empty when the file does not exist.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or
    /// lists the same id twice.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<RegistryFile>(&bytes).map_err(|e| {
                IngestError::serialization(format!("Invalid registry file {}", path.display()), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => return Err(IngestError::io(&path, e)),
        };

        let mut sources = BTreeMap::new();
        for record in file.sources {
            if let Err(e) = record.config.validate() {
                tracing::warn!("Registry entry {} is invalid: {}", record.id, e);
            }
            if sources.insert(record.id, record).is_some() {
                return Err(IngestError::configuration(format!(
                    "Duplicate source id in {}",
                    path.display()
                )));
            }
        }

        tracing::debug!("Loaded {} sources from {}", sources.len(), path.display());
        Ok(Self {
            path,
            sources: RwLock::new(sources),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds or replaces a record and persists the registry.
    pub async fn insert(&self, record: SourceRecord) -> Result<()> {
        let mut sources = self.sources.write().await;
        sources.insert(record.id, record);
        self.persist(&sources).await
    }

    async fn persist(&self, sources: &BTreeMap<u64, SourceRecord>) -> Result<()> {
        let file = RegistryFile {
            sources: sources.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IngestError::serialization("Failed to serialize registry", e))?;
        write_atomically(&self.path, &json)
            .await
            .map_err(|e| IngestError::io(&self.path, e))
    }
}

#[async_trait]
impl SourceRegistry for FileSourceRegistry {
    async fn get(&self, source_id: u64) -> Result<SourceRecord> {
        self.sources
            .read()
            .await
            .get(&source_id)
            .cloned()
            .ok_or(IngestError::SourceNotFound { source_id })
    }

    async fn list(&self) -> Result<Vec<SourceRecord>> {
        Ok(self.sources.read().await.values().cloned().collect())
    }

    async fn mark_synced(&self, source_id: u64, at: DateTime<Utc>) -> Result<()> {
        let mut sources = self.sources.write().await;
        let record = sources
            .get_mut(&source_id)
            .ok_or(IngestError::SourceNotFound { source_id })?;
        record.last_synced = Some(at);
        self.persist(&sources).await
    }
}

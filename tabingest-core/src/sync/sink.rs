//! Row sinks receiving synchronized rows.
//!
//! A sink replaces every stored row of a source in one step. Implementations
//! build the replacement completely before swapping it in, so a failed sync
//! never leaves a partial row set behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;

use crate::error::IngestError;
use crate::Result;

/// One row as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Zero-based position in the source
    pub row_index: usize,
    /// Column name to value
    pub data: Map<String, JsonValue>,
}

impl StoredRow {
    pub fn new(row_index: usize, data: Map<String, JsonValue>) -> Self {
        Self { row_index, data }
    }
}

/// Destination for synchronized rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Deletes every stored row for `source_id`, then stores `rows`.
    ///
    /// Returns the number of rows stored.
    ///
    /// # Errors
    /// Returns a storage error if the rows cannot be persisted; previously
    /// stored rows are left untouched in that case.
    async fn replace_rows(&self, source_id: u64, rows: Vec<StoredRow>) -> Result<usize>;
}

/// In-memory sink for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: RwLock<HashMap<u64, Vec<StoredRow>>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently stored for a source.
    pub async fn rows(&self, source_id: u64) -> Vec<StoredRow> {
        self.rows
            .read()
            .await
            .get(&source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn row_count(&self, source_id: u64) -> usize {
        self.rows.read().await.get(&source_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RowSink for MemoryRowStore {
    async fn replace_rows(&self, source_id: u64, rows: Vec<StoredRow>) -> Result<usize> {
        let count = rows.len();
        self.rows.write().await.insert(source_id, rows);
        Ok(count)
    }
}

/// Sink writing one JSON document per source into a directory.
///
/// Rows for source `N` land in `source_N.json`. The file is written to a
/// temporary sibling and renamed over the previous one.
#[derive(Debug, Clone)]
pub struct JsonFileRowSink {
    directory: PathBuf,
}

impl JsonFileRowSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Path holding the rows of a source.
    pub fn path_for(&self, source_id: u64) -> PathBuf {
        self.directory.join(format!("source_{}.json", source_id))
    }

    /// Reads back the rows stored for a source.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(&self, source_id: u64) -> Result<Vec<StoredRow>> {
        let path = self.path_for(source_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                IngestError::serialization(format!("Failed to parse {}", path.display()), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(IngestError::io(&path, e)),
        }
    }
}

#[async_trait]
impl RowSink for JsonFileRowSink {
    async fn replace_rows(&self, source_id: u64, rows: Vec<StoredRow>) -> Result<usize> {
        let path = self.path_for(source_id);
        let json = serde_json::to_vec_pretty(&rows)
            .map_err(|e| IngestError::serialization("Failed to serialize rows", e))?;

        write_atomically(&path, &json)
            .await
            .map_err(|e| IngestError::storage(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::debug!("Stored {} rows in {}", rows.len(), path.display());
        Ok(rows.len())
    }
}

/// Writes through a temporary sibling file and renames it into place.
pub(crate) async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, contents).await?;
    tokio::fs::rename(&temp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(index: usize, value: JsonValue) -> StoredRow {
        let mut data = Map::new();
        data.insert("v".to_string(), value);
        StoredRow::new(index, data)
    }

    #[tokio::test]
    async fn test_memory_store_replaces_rows() {
        let store = MemoryRowStore::new();
        store
            .replace_rows(1, vec![row(0, json!(1)), row(1, json!(2))])
            .await
            .unwrap();
        assert_eq!(store.row_count(1).await, 2);

        let stored = store.replace_rows(1, vec![row(0, json!(3))]).await.unwrap();
        assert_eq!(stored, 1);
        assert_eq!(store.rows(1).await, vec![row(0, json!(3))]);
        assert_eq!(store.row_count(2).await, 0);
    }

    #[tokio::test]
    async fn test_json_file_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileRowSink::new(dir.path().join("rows"));

        assert!(sink.load(5).await.unwrap().is_empty());

        sink.replace_rows(5, vec![row(0, json!("a")), row(1, json!(null))])
            .await
            .unwrap();
        sink.replace_rows(5, vec![row(0, json!("b"))]).await.unwrap();

        let stored = sink.load(5).await.unwrap();
        assert_eq!(stored, vec![row(0, json!("b"))]);
        assert!(!sink.path_for(5).with_extension("json.tmp").exists());
    }
}

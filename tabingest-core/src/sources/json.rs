//! JSON document strategy.
//!
//! Accepted shapes:
//! - array of objects: one row per object, columns are the sorted union of
//!   keys over the first [`KEY_SAMPLE_OBJECTS`] objects
//! - array of scalars (or mixed): a single `value` column
//! - single object: one row
//! - top-level scalar: one row in a `value` column

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::helpers::{self, LoadedSource};
use super::{SourceConfig, SourceStrategy};
use crate::error::IngestError;
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

/// Objects inspected when collecting column names.
pub const KEY_SAMPLE_OBJECTS: usize = 100;

/// Column used for scalar values.
pub const VALUE_COLUMN: &str = "value";

pub struct JsonStrategy {
    config: SourceConfig,
    loaded: Option<LoadedSource>,
}

impl JsonStrategy {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            loaded: None,
        }
    }

    async fn load(&self) -> Result<LoadedSource> {
        let path = self.config.require_file_path()?;
        let bytes = helpers::read_source_file(path).await?;
        let (text, encoding) =
            helpers::decode_text(&bytes, self.config.declared_encoding.as_deref())?;

        let document: JsonValue = serde_json::from_str(&text).map_err(|e| {
            IngestError::serialization(format!("Failed to parse JSON in {}", path.display()), e)
        })?;

        let frame = frame_from_document(document);
        let mut loaded = LoadedSource::single_table(
            SourceKind::Json,
            helpers::table_name_for(path),
            frame,
            helpers::classify_json,
        );
        loaded.schema.encoding = Some(encoding);

        tracing::info!(
            "Loaded {} rows from JSON file {}",
            loaded.frame.row_count(),
            path.display()
        );
        Ok(loaded)
    }

    async fn loaded(&mut self) -> Result<&LoadedSource> {
        let loaded = match self.loaded.take() {
            Some(loaded) => loaded,
            None => self.load().await?,
        };
        Ok(self.loaded.insert(loaded))
    }
}

/// Flattens a parsed document into a frame.
pub fn frame_from_document(document: JsonValue) -> NormalizedFrame {
    match document {
        JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_object) => {
            let columns: BTreeSet<String> = items
                .iter()
                .take(KEY_SAMPLE_OBJECTS)
                .filter_map(JsonValue::as_object)
                .flat_map(|object| object.keys().cloned())
                .collect();
            let columns: Vec<String> = columns.into_iter().collect();

            let mut frame = NormalizedFrame::new(columns);
            for item in items {
                if let JsonValue::Object(mut object) = item {
                    let row = frame
                        .columns
                        .iter()
                        .map(|column| object.remove(column).unwrap_or(JsonValue::Null))
                        .collect();
                    frame.push_row(row);
                }
            }
            frame
        }
        JsonValue::Array(items) => {
            let mut frame = NormalizedFrame::new(vec![VALUE_COLUMN.to_string()]);
            for item in items {
                frame.push_row(vec![item]);
            }
            frame
        }
        JsonValue::Object(object) => {
            let columns: Vec<String> = object.keys().cloned().collect();
            let mut frame = NormalizedFrame::new(columns);
            frame.push_row(object.into_iter().map(|(_, value)| value).collect());
            frame
        }
        scalar => {
            let mut frame = NormalizedFrame::new(vec![VALUE_COLUMN.to_string()]);
            frame.push_row(vec![scalar]);
            frame
        }
    }
}

#[async_trait]
impl SourceStrategy for JsonStrategy {
    async fn connect(&mut self) -> Result<()> {
        self.loaded().await.map(|_| ())
    }

    async fn get_schema(&mut self) -> Result<SourceSchema> {
        Ok(self.loaded().await?.schema.clone())
    }

    async fn get_data(&mut self, limit: Option<usize>) -> Result<NormalizedFrame> {
        Ok(self.loaded().await?.data(limit))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.loaded = None;
        Ok(())
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn is_connected(&self) -> bool {
        self.loaded.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_of_objects_uses_sorted_key_union() {
        let frame = frame_from_document(json!([
            {"name": "Ada", "id": 1},
            {"id": 2, "email": "b@example.com"}
        ]));

        assert_eq!(frame.columns, vec!["email", "id", "name"]);
        assert_eq!(frame.rows[0], vec![json!(null), json!(1), json!("Ada")]);
        assert_eq!(frame.rows[1], vec![json!("b@example.com"), json!(2), json!(null)]);
    }

    #[test]
    fn test_keys_beyond_sample_are_ignored() {
        let mut items: Vec<JsonValue> = (0..KEY_SAMPLE_OBJECTS).map(|i| json!({"id": i})).collect();
        items.push(json!({"id": 999, "late": true}));

        let frame = frame_from_document(JsonValue::Array(items));
        assert_eq!(frame.columns, vec!["id"]);
        assert_eq!(frame.row_count(), KEY_SAMPLE_OBJECTS + 1);
    }

    #[test]
    fn test_array_of_scalars() {
        let frame = frame_from_document(json!([1, "two", null]));
        assert_eq!(frame.columns, vec![VALUE_COLUMN]);
        assert_eq!(frame.row_count(), 3);
        assert_eq!(frame.rows[1][0], json!("two"));
    }

    #[test]
    fn test_single_object_is_one_row() {
        let frame = frame_from_document(json!({"a": 1, "b": [1, 2]}));
        assert_eq!(frame.row_count(), 1);
        assert_eq!(frame.rows[0][1], json!([1, 2]));
    }

    #[test]
    fn test_empty_array() {
        let frame = frame_from_document(json!([]));
        assert_eq!(frame.columns, vec![VALUE_COLUMN]);
        assert!(frame.is_empty());
    }
}

//! Spreadsheet strategy backed by `calamine`.
//!
//! Reads the first worksheet (or `sheet_name`) with the first row as the
//! header. Workbook parsing is blocking and runs on the blocking pool.

use std::path::Path;

use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto};
use serde_json::Value as JsonValue;

use super::helpers::{self, LoadedSource};
use super::{SourceConfig, SourceStrategy};
use crate::error::IngestError;
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

pub struct SpreadsheetStrategy {
    config: SourceConfig,
    loaded: Option<LoadedSource>,
}

impl SpreadsheetStrategy {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            loaded: None,
        }
    }

    async fn load(&self) -> Result<LoadedSource> {
        let path = self.config.require_file_path()?.to_path_buf();
        let sheet_name = self.config.sheet_name.clone();

        let (sheet, frame) = tokio::task::spawn_blocking(move || read_sheet(&path, sheet_name))
            .await
            .map_err(|e| IngestError::query_failed("Spreadsheet reader task failed", e))??;

        let loaded = LoadedSource::single_table(
            SourceKind::Spreadsheet,
            sheet.clone(),
            frame,
            helpers::classify_json,
        );

        tracing::info!(
            "Loaded {} rows from sheet {:?} of {}",
            loaded.frame.row_count(),
            sheet,
            self.config
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

/// Reads one worksheet into a frame, returning the sheet name used.
fn read_sheet(path: &Path, sheet_name: Option<String>) -> Result<(String, NormalizedFrame)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        IngestError::query_failed(format!("Failed to open workbook {}", path.display()), e)
    })?;

    let names = workbook.sheet_names();
    let sheet = select_sheet(&names, sheet_name.as_deref(), path)?;
    let Some(sheet) = sheet else {
        return Ok((helpers::table_name_for(path), NormalizedFrame::default()));
    };

    let range = workbook.worksheet_range(&sheet).map_err(|e| {
        IngestError::query_failed(format!("Failed to read sheet {:?}", sheet), e)
    })?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok((sheet, NormalizedFrame::default()));
    };

    let names = header.iter().map(header_text).collect::<Vec<_>>();
    let width = range.width();
    let mut frame = NormalizedFrame::new(helpers::unique_headers(names, width));

    for row in rows {
        let values: Vec<JsonValue> = row.iter().map(cell_value).collect();
        if values.iter().all(JsonValue::is_null) {
            continue;
        }
        frame.push_row(values);
    }

    Ok((sheet, frame))
}

fn select_sheet(names: &[String], requested: Option<&str>, path: &Path) -> Result<Option<String>> {
    match requested {
        None => Ok(names.first().cloned()),
        Some(requested) => names
            .iter()
            .find(|name| name.as_str() == requested)
            .or_else(|| names.iter().find(|name| name.eq_ignore_ascii_case(requested)))
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                IngestError::configuration(format!(
                    "Sheet {:?} not found in {} (available: {})",
                    requested,
                    path.display(),
                    names.join(", ")
                ))
            }),
    }
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Converts a cell to JSON. Dates render as `YYYY-MM-DD HH:MM:SS`, error
/// cells and blanks become null.
pub(crate) fn cell_value(cell: &Data) -> JsonValue {
    match cell {
        Data::Int(i) => JsonValue::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Data::String(s) if s.is_empty() => JsonValue::Null,
        Data::String(s) => JsonValue::String(s.clone()),
        Data::Bool(b) => JsonValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or_else(|| {
                serde_json::Number::from_f64(dt.as_f64())
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => JsonValue::String(s.clone()),
        Data::Error(_) | Data::Empty => JsonValue::Null,
    }
}

#[async_trait]
impl SourceStrategy for SpreadsheetStrategy {
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
        SourceKind::Spreadsheet
    }

    fn is_connected(&self) -> bool {
        self.loaded.is_some()
    }
}

//! Helper utilities shared by the file-backed strategies.
//!
//! Covers reading and decoding source files, tabular parsing through the
//! `csv` crate, header normalization and column type inference.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::dump::encoding;
use crate::error::IngestError;
use crate::models::{ColumnDescriptor, NormalizedFrame, SourceKind, SourceSchema, TableDescriptor};
use crate::Result;

/// Fully parsed contents of a file source held between `connect` and
/// `disconnect`.
#[derive(Debug, Clone)]
pub(crate) struct LoadedSource {
    pub schema: SourceSchema,
    pub frame: NormalizedFrame,
}

impl LoadedSource {
    /// Builds the schema for a single-table source from its frame.
    pub fn single_table(
        kind: SourceKind,
        table_name: impl Into<String>,
        frame: NormalizedFrame,
        infer: fn(&JsonValue) -> ValueClass,
    ) -> Self {
        let mut schema = SourceSchema::new(kind);
        schema.tables.push(describe_frame(table_name, &frame, infer));
        Self { schema, frame }
    }

    pub fn data(&self, limit: Option<usize>) -> NormalizedFrame {
        let mut frame = self.frame.clone();
        frame.truncate(limit);
        frame
    }
}

/// Reads the whole file.
pub(crate) async fn read_source_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::io(path, e))
}

/// Table name derived from the file stem.
pub(crate) fn table_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "data".to_string())
}

/// Decodes text with the declared encoding, or UTF-8 then latin-1.
///
/// Returns the text and the encoding label that succeeded.
///
/// # Errors
/// Returns `EncodingExhausted` when a declared encoding cannot decode the
/// bytes.
pub(crate) fn decode_text(bytes: &[u8], declared: Option<&str>) -> Result<(String, String)> {
    if let Some(label) = declared {
        let label = encoding::normalize_label(label);
        return encoding::decode(bytes, &label)
            .map(|text| (text, label.clone()))
            .ok_or(IngestError::EncodingExhausted { tried: vec![label] });
    }

    for label in ["utf-8", "latin-1"] {
        if let Some(text) = encoding::decode(bytes, label) {
            return Ok((text, label.to_string()));
        }
    }

    Err(IngestError::EncodingExhausted {
        tried: vec!["utf-8".to_string(), "latin-1".to_string()],
    })
}

/// Parses delimited text into a frame of string values.
///
/// Empty fields become null. Rows narrower than the widest row are padded.
pub(crate) fn parse_delimited(
    text: &str,
    delimiter: u8,
    has_header: bool,
    quoting: bool,
) -> Result<NormalizedFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(quoting)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::query_failed("Failed to read delimited record", e))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }

    let header = if has_header && !records.is_empty() {
        Some(records.remove(0))
    } else {
        None
    };

    let width = records
        .iter()
        .map(Vec::len)
        .chain(header.iter().map(Vec::len))
        .max()
        .unwrap_or(0);

    let columns = match header {
        Some(names) => unique_headers(names, width),
        None => generated_columns(width),
    };

    let mut frame = NormalizedFrame::new(columns);
    for record in records {
        frame.push_row(
            record
                .into_iter()
                .map(|field| {
                    if field.is_empty() {
                        JsonValue::Null
                    } else {
                        JsonValue::String(field)
                    }
                })
                .collect(),
        );
    }
    Ok(frame)
}

/// Column names `col_1..col_n`.
pub(crate) fn generated_columns(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("col_{}", i)).collect()
}

/// Trims header names, fills blanks with `col_N`, suffixes duplicates and
/// extends to `width`.
pub(crate) fn unique_headers(names: Vec<String>, width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(width.max(names.len()));

    let padded = names
        .into_iter()
        .map(Some)
        .chain(std::iter::repeat(None))
        .take(width);

    for (index, name) in padded.enumerate() {
        let base = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("col_{}", index + 1));

        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.to_lowercase()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        columns.push(candidate);
    }
    columns
}

/// Classification of a single non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueClass {
    Boolean,
    Integer,
    Float,
    Temporal,
    Text,
}

/// Classifies string content, used for text formats.
pub(crate) fn classify_text(value: &JsonValue) -> ValueClass {
    match value {
        JsonValue::String(s) => classify_str(s),
        other => classify_json(other),
    }
}

/// Classifies by JSON value kind; strings are only checked for timestamps.
pub(crate) fn classify_json(value: &JsonValue) -> ValueClass {
    match value {
        JsonValue::Bool(_) => ValueClass::Boolean,
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => ValueClass::Integer,
        JsonValue::Number(_) => ValueClass::Float,
        JsonValue::String(s) if is_timestamp(s) => ValueClass::Temporal,
        _ => ValueClass::Text,
    }
}

fn classify_str(s: &str) -> ValueClass {
    let trimmed = s.trim();
    if trimmed.parse::<i64>().is_ok() {
        ValueClass::Integer
    } else if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        ValueClass::Float
    } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        ValueClass::Boolean
    } else if is_timestamp(trimmed) {
        ValueClass::Temporal
    } else {
        ValueClass::Text
    }
}

/// True for RFC 3339 timestamps, `YYYY-MM-DD[ HH:MM:SS]` and the `T` form.
pub(crate) fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Raw type name for a column given its non-null values.
///
/// Integers widen to floats; any other disagreement falls back to `TEXT`.
pub(crate) fn infer_raw_type<'a>(
    values: impl Iterator<Item = &'a JsonValue>,
    classify: fn(&JsonValue) -> ValueClass,
) -> &'static str {
    let mut merged: Option<ValueClass> = None;
    for value in values.filter(|v| !v.is_null()) {
        let class = classify(value);
        merged = Some(match (merged, class) {
            (None, class) => class,
            (Some(a), b) if a == b => a,
            (Some(ValueClass::Integer), ValueClass::Float)
            | (Some(ValueClass::Float), ValueClass::Integer) => ValueClass::Float,
            _ => ValueClass::Text,
        });
        if merged == Some(ValueClass::Text) {
            break;
        }
    }

    match merged {
        Some(ValueClass::Boolean) => "BOOLEAN",
        Some(ValueClass::Integer) => "BIGINT",
        Some(ValueClass::Float) => "DOUBLE",
        Some(ValueClass::Temporal) => "TIMESTAMP",
        Some(ValueClass::Text) | None => "TEXT",
    }
}

/// Describes a frame as a single table with inferred column types.
pub(crate) fn describe_frame(
    table_name: impl Into<String>,
    frame: &NormalizedFrame,
    classify: fn(&JsonValue) -> ValueClass,
) -> TableDescriptor {
    let columns = frame
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values = frame.rows.iter().filter_map(|row| row.get(index));
            let nullable = frame
                .rows
                .iter()
                .any(|row| row.get(index).is_none_or(JsonValue::is_null));
            ColumnDescriptor::new(name.clone(), infer_raw_type(values, classify))
                .with_nullable(nullable || frame.rows.is_empty())
        })
        .collect();

    TableDescriptor::new(table_name, columns).with_row_count(frame.row_count() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenericType;
    use serde_json::json;

    #[test]
    fn test_decode_text_fallback_to_latin1() {
        let (text, label) = decode_text(b"caf\xe9", None).unwrap();
        assert_eq!(text, "café");
        assert_eq!(label, "latin-1");

        let (text, label) = decode_text("café".as_bytes(), None).unwrap();
        assert_eq!(text, "café");
        assert_eq!(label, "utf-8");
    }

    #[test]
    fn test_decode_text_declared_failure() {
        let error = decode_text(b"\xff\xfe\xfd", Some("utf-8")).unwrap_err();
        assert!(matches!(error, IngestError::EncodingExhausted { .. }));
    }

    #[test]
    fn test_parse_delimited_with_header() {
        let frame = parse_delimited("id,name\n1,Ada\n2,\n", b',', true, true).unwrap();
        assert_eq!(frame.columns, vec!["id", "name"]);
        assert_eq!(frame.rows[1], vec![json!("2"), json!(null)]);
    }

    #[test]
    fn test_parse_delimited_headerless_and_ragged() {
        let frame = parse_delimited("1;2\n3;4;5\n", b';', false, true).unwrap();
        assert_eq!(frame.columns, vec!["col_1", "col_2", "col_3"]);
        assert_eq!(frame.rows[0], vec![json!("1"), json!("2"), json!(null)]);
    }

    #[test]
    fn test_parse_delimited_quoting() {
        let quoted = parse_delimited("a,b\n\"x,y\",z\n", b',', true, true).unwrap();
        assert_eq!(quoted.rows[0][0], json!("x,y"));

        let literal = parse_delimited("a|b\n\"x|y\n", b'|', true, false).unwrap();
        assert_eq!(literal.rows[0][0], json!("\"x"));
    }

    #[test]
    fn test_unique_headers() {
        let names = vec!["id".to_string(), " ".to_string(), "ID".to_string()];
        assert_eq!(unique_headers(names, 4), vec!["id", "col_2", "ID_2", "col_4"]);
        assert!(unique_headers(Vec::new(), 0).is_empty());
    }

    #[test]
    fn test_infer_raw_type() {
        let ints = [json!("1"), json!("2"), json!(null)];
        assert_eq!(infer_raw_type(ints.iter(), classify_text), "BIGINT");

        let mixed = [json!("1"), json!("2.5")];
        assert_eq!(infer_raw_type(mixed.iter(), classify_text), "DOUBLE");

        let dates = [json!("2024-01-01"), json!("2024-01-02 10:00:00")];
        assert_eq!(infer_raw_type(dates.iter(), classify_text), "TIMESTAMP");

        let text = [json!("1"), json!("abc")];
        assert_eq!(infer_raw_type(text.iter(), classify_text), "TEXT");

        let json_strings = [json!("1"), json!("2")];
        assert_eq!(infer_raw_type(json_strings.iter(), classify_json), "TEXT");

        assert_eq!(infer_raw_type([json!(true)].iter(), classify_json), "BOOLEAN");
        assert_eq!(infer_raw_type(std::iter::empty(), classify_json), "TEXT");
    }

    #[test]
    fn test_describe_frame() {
        let mut frame = NormalizedFrame::new(vec!["n".to_string(), "t".to_string()]);
        frame.push_row(vec![json!("1"), json!("x")]);
        frame.push_row(vec![json!("2"), json!(null)]);

        let table = describe_frame("sample", &frame, classify_text);
        assert_eq!(table.name(), "sample");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[0].generic_type(), GenericType::Integer);
        assert!(!table.columns()[0].nullable());
        assert!(table.columns()[1].nullable());
    }

    #[test]
    fn test_table_name_for() {
        assert_eq!(table_name_for(Path::new("/tmp/users.csv")), "users");
        assert_eq!(table_name_for(Path::new("/")), "data");
    }
}

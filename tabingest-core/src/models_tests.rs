//! Tests for the normalized source models.

use super::*;
use serde_json::json;

#[test]
fn test_column_descriptor_derives_generic_type() {
    let column = ColumnDescriptor::new("id", "int unsigned");
    assert_eq!(column.raw_type(), "INT UNSIGNED");
    assert_eq!(column.generic_type(), GenericType::Integer);
    assert!(column.nullable());
    assert!(!column.is_primary_key());

    let column = ColumnDescriptor::new("notes", "");
    assert_eq!(column.generic_type(), GenericType::Text);
}

#[test]
fn test_column_descriptor_serializes_type_key() {
    let column = ColumnDescriptor::new("price", "DECIMAL")
        .with_nullable(false)
        .with_primary_key(false);
    let value = serde_json::to_value(&column).unwrap();

    assert_eq!(value["name"], "price");
    assert_eq!(value["type"], "DECIMAL");
    assert_eq!(value["generic_type"], "float");
    assert_eq!(value["nullable"], false);
}

#[test]
fn test_table_descriptor_column_lookup() {
    let table = TableDescriptor::new(
        "users",
        vec![
            ColumnDescriptor::new("ID", "INT"),
            ColumnDescriptor::new("name", "VARCHAR"),
        ],
    )
    .with_row_count(3);

    assert_eq!(table.column_index("id"), Some(0));
    assert_eq!(table.column_index("NAME"), Some(1));
    assert_eq!(table.column_index("missing"), None);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_names(), vec!["ID", "name"]);
}

#[test]
fn test_source_schema_totals_and_warnings() {
    let mut schema = SourceSchema::new(SourceKind::SqlDump);
    schema.tables.push(TableDescriptor::new("x", vec![]).with_row_count(2));
    schema.tables.push(TableDescriptor::new("y", vec![]).with_row_count(3));
    schema.add_warning("Test warning");

    assert_eq!(schema.total_rows(), 5);
    assert_eq!(schema.warnings, vec!["Test warning"]);
    assert!(schema.table("X").is_some());
}

#[test]
fn test_source_schema_omits_unknown_metadata() {
    let schema = SourceSchema::new(SourceKind::Json);
    let value = serde_json::to_value(&schema).unwrap();

    assert_eq!(value["source_kind"], "json");
    assert!(value.get("encoding").is_none());
    assert!(value.get("delimiter").is_none());
    assert!(value.get("warnings").is_none());
    assert_eq!(value["tables"], json!([]));
}

#[test]
fn test_frame_push_row_aligns_width() {
    let mut frame = NormalizedFrame::new(vec!["a".to_string(), "b".to_string()]);
    frame.push_row(vec![json!(1)]);
    frame.push_row(vec![json!(1), json!(2), json!(3)]);

    assert_eq!(frame.rows[0], vec![json!(1), json!(null)]);
    assert_eq!(frame.rows[1], vec![json!(1), json!(2)]);
}

#[test]
fn test_frame_to_records() {
    let mut frame = NormalizedFrame::new(vec!["a".to_string(), "b".to_string()]);
    frame.push_row(vec![json!("x"), json!(null)]);

    let records = frame.to_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["a"], "x");
    assert_eq!(records[0]["b"], json!(null));
}

#[test]
fn test_frame_truncate() {
    let mut frame = NormalizedFrame::new(vec!["a".to_string()]);
    for i in 0..5 {
        frame.push_row(vec![json!(i)]);
    }
    frame.truncate(None);
    assert_eq!(frame.row_count(), 5);
    frame.truncate(Some(2));
    assert_eq!(frame.row_count(), 2);
}

#[test]
fn test_source_kind_aliases() {
    let test_cases = [
        ("csv", SourceKind::DelimitedFile),
        ("Delimited", SourceKind::DelimitedFile),
        ("XLSX", SourceKind::Spreadsheet),
        ("xls", SourceKind::Spreadsheet),
        ("excel", SourceKind::Spreadsheet),
        ("json", SourceKind::Json),
        ("text", SourceKind::PlainText),
        ("plain_text", SourceKind::PlainText),
        ("dump", SourceKind::SqlDump),
        ("sql_dump", SourceKind::SqlDump),
        ("postgres", SourceKind::RelationalConnection),
        ("MySQL", SourceKind::RelationalConnection),
        ("sqlite", SourceKind::RelationalConnection),
        ("database", SourceKind::RelationalConnection),
    ];

    for (tag, expected) in test_cases {
        assert_eq!(SourceKind::from_tag(tag), Some(expected), "tag {}", tag);
    }
    assert_eq!(SourceKind::from_tag("parquet"), None);
}

#[test]
fn test_source_kind_canonical_tags_round_trip() {
    for kind in SourceKind::ALL {
        assert_eq!(SourceKind::from_tag(kind.as_tag()), Some(kind));
    }
    assert!(!SourceKind::RelationalConnection.is_file_based());
    assert!(SourceKind::SqlDump.is_file_based());
}

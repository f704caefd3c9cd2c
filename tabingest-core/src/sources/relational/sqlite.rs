//! SQLite introspection and reads.
//!
//! SQLite uses file-based databases, so the pool holds a single read-only
//! connection unless configured otherwise.

use std::str::FromStr;

use base64::Engine;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{DatabaseEngine, limit_param, row_count};
use crate::error::IngestError;
use crate::models::{ColumnDescriptor, NormalizedFrame, TableDescriptor};
use crate::sources::ConnectionConfig;
use crate::Result;

pub(super) async fn connect(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<SqlitePool> {
    let normalized = normalize_connection_string(connection_string);

    let mut options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
        IngestError::configuration(format!("Invalid SQLite connection string: {}", e))
    })?;

    if config.read_only {
        options = options.read_only(true);
    }

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
        .map_err(|e| IngestError::Connection {
            context: format!(
                "Failed to open SQLite database {}",
                config.database.as_deref().unwrap_or("main")
            ),
            source: Box::new(e),
        })
}

/// Converts bare paths and `:memory:` into `sqlite:` URLs.
pub(super) fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}

pub(super) async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
          AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed("Failed to list SQLite tables", e))
}

pub(super) async fn describe_table(pool: &SqlitePool, name: &str) -> Result<TableDescriptor> {
    let quoted = DatabaseEngine::Sqlite.quote_identifier(name);

    let rows = sqlx::query(&format!("PRAGMA table_info({})", quoted))
        .fetch_all(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to describe table {}", name), e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let column: String = row
            .try_get("name")
            .map_err(|e| IngestError::query_failed(format!("Failed to read column of {}", name), e))?;
        let declared_type: String = row.try_get("type").unwrap_or_default();
        let not_null: i64 = row.try_get("notnull").unwrap_or(0);
        let pk_position: i64 = row.try_get("pk").unwrap_or(0);
        columns.push((column, declared_type, not_null != 0, pk_position));
    }

    let pk_columns = columns.iter().filter(|(_, _, _, pk)| *pk > 0).count();
    let descriptors = columns
        .into_iter()
        .map(|(column, declared_type, not_null, pk_position)| {
            let primary_key = pk_position > 0;
            // INTEGER PRIMARY KEY aliases the rowid
            let rowid_alias = primary_key
                && pk_columns == 1
                && declared_type.trim().eq_ignore_ascii_case("INTEGER");
            ColumnDescriptor::new(column, declared_type)
                .with_nullable(!not_null && !primary_key)
                .with_primary_key(primary_key)
                .with_auto_increment(rowid_alias)
        })
        .collect();

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted))
        .fetch_one(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to count rows in {}", name), e))?;

    Ok(TableDescriptor::new(name, descriptors).with_row_count(row_count(count)))
}

pub(super) async fn read_rows(
    pool: &SqlitePool,
    table: &TableDescriptor,
    limit: Option<usize>,
) -> Result<NormalizedFrame> {
    let mut sql = format!(
        "SELECT * FROM {}",
        DatabaseEngine::Sqlite.quote_identifier(table.name())
    );
    if limit.is_some() {
        sql.push_str(" LIMIT ?");
    }

    let mut query = sqlx::query(&sql);
    if let Some(limit) = limit {
        query = query.bind(limit_param(limit));
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to read rows from {}", table.name()), e))?;

    let mut frame = NormalizedFrame::new(table.column_names());
    for row in &rows {
        frame.push_row(
            (0..frame.columns.len())
                .map(|index| extract_column_value(row, index))
                .collect(),
        );
    }
    Ok(frame)
}

/// SQLite is dynamically typed, so each value tries text, integer, real,
/// boolean and blob in turn.
fn extract_column_value(row: &SqliteRow, index: usize) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                JsonValue::String(format!("base64:{}", encoded))
            })
            .unwrap_or(JsonValue::Null);
    }

    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_connection_string("sqlite:///path/db.sqlite"),
            "sqlite:///path/db.sqlite"
        );
        assert_eq!(
            normalize_connection_string("/path/to/db.sqlite"),
            "sqlite:///path/to/db.sqlite"
        );
    }
}

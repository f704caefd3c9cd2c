//! MySQL introspection and reads for the connection's current database.
//!
//! `information_schema` columns are cast to `CHAR` since MySQL 8 reports
//! some of them as binary strings.

use base64::Engine;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Executor, MySqlPool, Row};

use super::{DatabaseEngine, limit_param, row_count, typed_value};
use crate::error::{IngestError, redact_connection_url};
use crate::models::{ColumnDescriptor, NormalizedFrame, TableDescriptor};
use crate::sources::ConnectionConfig;
use crate::Result;

pub(super) async fn connect(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<MySqlPool> {
    let read_only = config.read_only;

    MySqlPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .acquire_timeout(config.connect_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }
                conn.execute("SET time_zone = '+00:00'").await?;
                Ok(())
            })
        })
        .connect(connection_string)
        .await
        .map_err(|e| IngestError::Connection {
            context: format!(
                "Failed to connect to MySQL at {}",
                redact_connection_url(connection_string)
            ),
            source: Box::new(e),
        })
}

pub(super) async fn list_tables(pool: &MySqlPool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR)
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed("Failed to list MySQL tables", e))
}

pub(super) async fn describe_table(pool: &MySqlPool, name: &str) -> Result<TableDescriptor> {
    let columns = sqlx::query_as::<_, (String, String, String, String, String)>(
        r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR),
            CAST(DATA_TYPE AS CHAR),
            CAST(IS_NULLABLE AS CHAR),
            CAST(COLUMN_KEY AS CHAR),
            CAST(EXTRA AS CHAR)
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed(format!("Failed to describe table {}", name), e))?;

    let descriptors = columns
        .into_iter()
        .map(|(column, data_type, is_nullable, column_key, extra)| {
            let primary_key = column_key == "PRI";
            ColumnDescriptor::new(column, data_type)
                .with_nullable(is_nullable == "YES")
                .with_primary_key(primary_key)
                .with_auto_increment(extra.to_ascii_lowercase().contains("auto_increment"))
        })
        .collect();

    let count_sql = format!(
        "SELECT COUNT(*) FROM {}",
        DatabaseEngine::MySql.quote_identifier(name)
    );
    let count: i64 = sqlx::query_scalar(&count_sql)
        .fetch_one(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to count rows in {}", name), e))?;

    Ok(TableDescriptor::new(name, descriptors).with_row_count(row_count(count)))
}

/// Reads rows with every column cast to text, then restores numbers and
/// booleans from the column's generic type.
pub(super) async fn read_rows(
    pool: &MySqlPool,
    table: &TableDescriptor,
    limit: Option<usize>,
) -> Result<NormalizedFrame> {
    let select_list = table
        .columns()
        .iter()
        .map(|column| {
            let quoted = DatabaseEngine::MySql.quote_identifier(column.name());
            format!("CAST({} AS CHAR) AS {}", quoted, quoted)
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {} FROM {}",
        select_list,
        DatabaseEngine::MySql.quote_identifier(table.name())
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
            table
                .columns()
                .iter()
                .enumerate()
                .map(|(index, column)| extract_column_value(row, index, column))
                .collect(),
        );
    }
    Ok(frame)
}

fn extract_column_value(row: &MySqlRow, index: usize, column: &ColumnDescriptor) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v
            .map(|text| typed_value(text, column.generic_type()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| match String::from_utf8(bytes) {
                Ok(text) => typed_value(text, column.generic_type()),
                Err(e) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(e.as_bytes());
                    JsonValue::String(format!("base64:{}", encoded))
                }
            })
            .unwrap_or(JsonValue::Null);
    }

    JsonValue::Null
}

//! PostgreSQL introspection and reads for schema `public`.

use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use super::{DatabaseEngine, frame_from_objects, limit_param, row_count};
use crate::error::{IngestError, redact_connection_url};
use crate::models::{ColumnDescriptor, NormalizedFrame, TableDescriptor};
use crate::sources::ConnectionConfig;
use crate::Result;

const SCHEMA: &str = "public";

/// Opens a pool, applying session settings to every new connection.
pub(super) async fn connect(connection_string: &str, config: &ConnectionConfig) -> Result<PgPool> {
    let read_only = config.read_only;

    PgPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .acquire_timeout(config.connect_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                let app_name = format!("tabingest-{}", env!("CARGO_PKG_VERSION"));
                conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                    .await?;

                if read_only {
                    conn.execute("SET default_transaction_read_only = on")
                        .await?;
                }

                conn.execute("SET timezone = 'UTC'").await?;
                Ok(())
            })
        })
        .connect(connection_string)
        .await
        .map_err(|e| IngestError::Connection {
            context: format!(
                "Failed to connect to PostgreSQL at {}",
                redact_connection_url(connection_string)
            ),
            source: Box::new(e),
        })
}

pub(super) async fn list_tables(pool: &PgPool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = $1
          AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .bind(SCHEMA)
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed("Failed to list PostgreSQL tables", e))
}

pub(super) async fn describe_table(pool: &PgPool, name: &str) -> Result<TableDescriptor> {
    let columns = sqlx::query_as::<_, (String, String, String, Option<String>, Option<String>)>(
        r#"
        SELECT
            column_name::text,
            data_type::text,
            is_nullable::text,
            column_default::text,
            is_identity::text
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(SCHEMA)
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed(format!("Failed to describe table {}", name), e))?;

    let primary_keys = sqlx::query_scalar::<_, String>(
        r#"
        SELECT kcu.column_name::text
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON tc.constraint_name = kcu.constraint_name
         AND tc.table_schema = kcu.table_schema
         AND tc.table_name = kcu.table_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = $1
          AND tc.table_name = $2
        "#,
    )
    .bind(SCHEMA)
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(|e| IngestError::query_failed(format!("Failed to read primary key of {}", name), e))?;

    let descriptors = columns
        .into_iter()
        .map(|(column, data_type, is_nullable, default, is_identity)| {
            let auto_increment = default.as_deref().is_some_and(|d| d.starts_with("nextval("))
                || is_identity.as_deref() == Some("YES");
            let primary_key = primary_keys.contains(&column);
            ColumnDescriptor::new(column, data_type)
                .with_nullable(is_nullable == "YES" && !primary_key)
                .with_primary_key(primary_key)
                .with_auto_increment(auto_increment)
        })
        .collect();

    let count_sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        DatabaseEngine::Postgres.quote_identifier(SCHEMA),
        DatabaseEngine::Postgres.quote_identifier(name)
    );
    let count: i64 = sqlx::query_scalar(&count_sql)
        .fetch_one(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to count rows in {}", name), e))?;

    Ok(TableDescriptor::new(name, descriptors).with_row_count(row_count(count)))
}

/// Reads rows through `row_to_json` so every column type maps to JSON.
pub(super) async fn read_rows(
    pool: &PgPool,
    table: &TableDescriptor,
    limit: Option<usize>,
) -> Result<NormalizedFrame> {
    let mut sql = format!(
        "SELECT row_to_json(t.*) FROM {}.{} t",
        DatabaseEngine::Postgres.quote_identifier(SCHEMA),
        DatabaseEngine::Postgres.quote_identifier(table.name())
    );
    if limit.is_some() {
        sql.push_str(" LIMIT $1");
    }

    let mut query = sqlx::query_scalar::<_, JsonValue>(&sql);
    if let Some(limit) = limit {
        query = query.bind(limit_param(limit));
    }

    let objects = query
        .fetch_all(pool)
        .await
        .map_err(|e| IngestError::query_failed(format!("Failed to read rows from {}", table.name()), e))?;

    Ok(frame_from_objects(table, objects))
}

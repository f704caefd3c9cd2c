//! Relational database strategy.
//!
//! One strategy serves PostgreSQL, MySQL and SQLite through `sqlx`. The
//! engine is detected from the connection string, with the source kind tag
//! as a hint for strings that carry no scheme.
//!
//! # Module Structure
//! - `postgres`: `information_schema` introspection, `row_to_json` reads
//! - `mysql`: `information_schema` introspection, text-cast reads
//! - `sqlite`: `sqlite_master` and `PRAGMA table_info` introspection
//!
//! # Security
//! - Connection strings are held in `Zeroizing` buffers
//! - Only redacted connection strings appear in errors and logs
//! - Connections are opened read-only where the engine supports it

use serde_json::Value as JsonValue;

use crate::error::{IngestError, redact_connection_url};
use crate::models::{GenericType, NormalizedFrame, TableDescriptor};
use crate::Result;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgresql")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
mod strategy;
#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub use strategy::RelationalStrategy;

/// Database engines reachable through the relational strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseEngine {
    Postgres,
    MySql,
    Sqlite,
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySql => write!(f, "MySQL"),
            Self::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl DatabaseEngine {
    /// Detects the engine from the connection string, falling back to the
    /// kind tag (`postgresql`, `postgres`, `mysql`, `sqlite`).
    ///
    /// # Errors
    /// Returns a configuration error if neither identifies an engine.
    pub fn detect(connection_string: &str, kind_hint: &str) -> Result<Self> {
        let lower = connection_string.trim().to_ascii_lowercase();

        let from_string = if lower.starts_with("postgres://") || lower.starts_with("postgresql://")
        {
            Some(Self::Postgres)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite:")
            || lower == ":memory:"
            || lower.ends_with(".db")
            || lower.ends_with(".sqlite")
            || lower.ends_with(".sqlite3")
        {
            Some(Self::Sqlite)
        } else {
            None
        };

        let from_hint = match kind_hint.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        };

        match (from_string, from_hint) {
            (Some(engine), Some(hint)) if engine != hint => {
                tracing::warn!(
                    "Source kind {} disagrees with connection string; using {}",
                    kind_hint,
                    engine
                );
                Ok(engine)
            }
            (Some(engine), _) | (None, Some(engine)) => Ok(engine),
            (None, None) => Err(IngestError::configuration(format!(
                "Cannot determine database engine from connection string {}",
                redact_connection_url(connection_string)
            ))),
        }
    }

    /// Cargo feature that compiles this engine's driver.
    pub fn feature(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Quotes an identifier, doubling embedded quote characters.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }
}

/// Builds a frame from JSON objects keyed by column name.
pub(crate) fn frame_from_objects(table: &TableDescriptor, objects: Vec<JsonValue>) -> NormalizedFrame {
    let mut frame = NormalizedFrame::new(table.column_names());
    for object in objects {
        let JsonValue::Object(mut object) = object else {
            continue;
        };
        let row = frame
            .columns
            .iter()
            .map(|column| object.remove(column).unwrap_or(JsonValue::Null))
            .collect();
        frame.push_row(row);
    }
    frame
}

/// Converts text returned by the database into a JSON value using the
/// column's generic type. Unparseable text stays a string.
pub(crate) fn typed_value(text: String, generic_type: GenericType) -> JsonValue {
    match generic_type {
        GenericType::Integer => text
            .trim()
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::String(text)),
        GenericType::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::String(text)),
        GenericType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => JsonValue::Bool(true),
            "0" | "false" | "f" => JsonValue::Bool(false),
            _ => JsonValue::String(text),
        },
        GenericType::Temporal | GenericType::Text => JsonValue::String(text),
    }
}

/// Row limit as a bind parameter.
pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Row count reported by `COUNT(*)`.
pub(crate) fn row_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

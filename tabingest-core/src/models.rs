//! Core data models for normalized tabular sources.
//!
//! Every source kind produces the same two records: a [`SourceSchema`]
//! describing its tables and a [`NormalizedFrame`] holding its rows.

use serde::{Deserialize, Serialize};

use crate::dump::type_mapping::map_sql_type;

/// Name of the synthetic column carrying a row's origin table in dump frames.
pub const SOURCE_TABLE_COLUMN: &str = "_source_table";

/// A single dump row, positionally aligned to its table's columns.
pub type Row = Vec<Option<String>>;

/// Supported source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DelimitedFile,
    Spreadsheet,
    Json,
    PlainText,
    SqlDump,
    RelationalConnection,
}

impl SourceKind {
    /// Every kind, in factory order.
    pub const ALL: [SourceKind; 6] = [
        SourceKind::DelimitedFile,
        SourceKind::Spreadsheet,
        SourceKind::Json,
        SourceKind::PlainText,
        SourceKind::SqlDump,
        SourceKind::RelationalConnection,
    ];

    /// Resolves a case-insensitive source tag, including aliases.
    ///
    /// Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" | "delimited_file" => Some(Self::DelimitedFile),
            "excel" | "xlsx" | "xls" | "spreadsheet" => Some(Self::Spreadsheet),
            "json" => Some(Self::Json),
            "txt" | "text" | "plain_text" => Some(Self::PlainText),
            "sql" | "sql_dump" | "dump" => Some(Self::SqlDump),
            "postgresql" | "postgres" | "mysql" | "sqlite" | "database"
            | "relational_connection" => Some(Self::RelationalConnection),
            _ => None,
        }
    }

    /// Canonical tag for this kind.
    pub fn as_tag(&self) -> &'static str {
        match self {
            SourceKind::DelimitedFile => "csv",
            SourceKind::Spreadsheet => "excel",
            SourceKind::Json => "json",
            SourceKind::PlainText => "txt",
            SourceKind::SqlDump => "sql",
            SourceKind::RelationalConnection => "database",
        }
    }

    /// True for kinds read from a local file.
    pub fn is_file_based(&self) -> bool {
        !matches!(self, SourceKind::RelationalConnection)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::DelimitedFile => write!(f, "Delimited file"),
            SourceKind::Spreadsheet => write!(f, "Spreadsheet"),
            SourceKind::Json => write!(f, "JSON"),
            SourceKind::PlainText => write!(f, "Plain text"),
            SourceKind::SqlDump => write!(f, "SQL dump"),
            SourceKind::RelationalConnection => write!(f, "Relational database"),
        }
    }
}

/// Engine-independent column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenericType {
    Integer,
    Float,
    Boolean,
    Temporal,
    Text,
}

impl std::fmt::Display for GenericType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenericType::Integer => write!(f, "integer"),
            GenericType::Float => write!(f, "float"),
            GenericType::Boolean => write!(f, "boolean"),
            GenericType::Temporal => write!(f, "temporal"),
            GenericType::Text => write!(f, "text"),
        }
    }
}

/// Column information.
///
/// `generic_type` is always derived from `raw_type`; there is no way to set
/// it independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    name: String,
    #[serde(rename = "type")]
    raw_type: String,
    generic_type: GenericType,
    nullable: bool,
    is_primary_key: bool,
    is_auto_increment: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable, non-key column from its raw SQL type.
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into().trim().to_ascii_uppercase();
        Self {
            name: name.into(),
            generic_type: map_sql_type(&raw_type),
            raw_type,
            nullable: true,
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_primary_key(mut self, is_primary_key: bool) -> Self {
        self.is_primary_key = is_primary_key;
        self
    }

    pub fn with_auto_increment(mut self, is_auto_increment: bool) -> Self {
        self.is_auto_increment = is_auto_increment;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_type(&self) -> &str {
        &self.raw_type
    }

    pub fn generic_type(&self) -> GenericType {
        self.generic_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.is_auto_increment
    }
}

/// Table information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
    row_count: u64,
}

impl TableDescriptor {
    /// Creates a table with no rows counted yet.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            row_count: 0,
        }
    }

    /// Sets the final row count.
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = row_count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Case-insensitive column lookup returning the column's position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Schema description returned by every source strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    pub tables: Vec<TableDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SourceSchema {
    /// Creates an empty schema for the given kind
    pub fn new(source_kind: SourceKind) -> Self {
        Self {
            source_kind,
            encoding: None,
            delimiter: None,
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds a warning to the schema
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sum of all table row counts
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(TableDescriptor::row_count).sum()
    }

    /// Case-insensitive table lookup
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

/// In-memory tabular data shared by every source kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl NormalizedFrame {
    /// Creates an empty frame with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding with nulls or truncating to the frame's width.
    pub fn push_row(&mut self, mut row: Vec<serde_json::Value>) {
        row.resize(self.columns.len(), serde_json::Value::Null);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keeps at most `limit` rows.
    pub fn truncate(&mut self, limit: Option<usize>) {
        if let Some(limit) = limit {
            self.rows.truncate(limit);
        }
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Converts each row into a JSON object keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

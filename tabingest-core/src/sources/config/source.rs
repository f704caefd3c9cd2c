//! Persisted source configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, redact_connection_url};
use crate::models::SourceKind;

/// Delimiter value requesting detection from the file contents.
pub const AUTO_DELIMITER: &str = "auto";

/// Configuration record for one data source.
///
/// This is the shape persisted by source registries and handed to
/// [`crate::sources::create_strategy`].
///
/// # Security
/// `Debug` and `Display` never print the connection string unredacted.
///
/// # Example
/// ```rust
/// use tabingest_core::sources::SourceConfig;
///
/// let config = SourceConfig::file("csv", "data/users.csv")
///     .with_delimiter(";")
///     .with_has_header(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind tag (`csv`, `excel`, `json`, `txt`, `sql`, `postgresql`, ...)
    pub source_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Encoding label tried before detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_encoding: Option<String>,
    /// Field delimiter, or `auto` for plain-text detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    /// Table read by relational sources; the first table when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("source_kind", &self.source_kind)
            .field("file_path", &self.file_path)
            .field(
                "connection_string",
                &self.connection_string.as_deref().map(redact_connection_url),
            )
            .field("declared_encoding", &self.declared_encoding)
            .field("delimiter", &self.delimiter)
            .field("has_header", &self.has_header)
            .field("sheet_name", &self.sheet_name)
            .field("table", &self.table)
            .finish()
    }
}

impl std::fmt::Display for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file_path, &self.connection_string) {
            (Some(path), _) => write!(f, "{}:{}", self.source_kind, path.display()),
            (None, Some(url)) => write!(f, "{}:{}", self.source_kind, redact_connection_url(url)),
            (None, None) => write!(f, "{}:<unconfigured>", self.source_kind),
        }
    }
}

impl SourceConfig {
    /// Creates a file-backed source configuration.
    pub fn file(source_kind: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            source_kind: source_kind.into(),
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Creates a database-backed source configuration.
    pub fn database(source_kind: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            source_kind: source_kind.into(),
            connection_string: Some(connection_string.into()),
            ..Default::default()
        }
    }

    pub fn with_declared_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.declared_encoding = Some(encoding.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Resolved kind, if the tag is known.
    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_tag(&self.source_kind)
    }

    /// Header flag with the default applied.
    pub fn has_header_or_default(&self) -> bool {
        self.has_header.unwrap_or(true)
    }

    /// Single-byte delimiter parsed from the configured string.
    ///
    /// Accepts a literal character or the escapes `\t`, `tab`, `comma`,
    /// `semicolon`, `pipe`. Returns `Ok(None)` when unset or `auto`.
    pub fn delimiter_byte(&self) -> crate::Result<Option<u8>> {
        let Some(raw) = self.delimiter.as_deref() else {
            return Ok(None);
        };
        let byte = match raw {
            AUTO_DELIMITER => return Ok(None),
            "\\t" | "tab" | "\t" => b'\t',
            "comma" => b',',
            "semicolon" => b';',
            "pipe" => b'|',
            other if other.len() == 1 && other.is_ascii() => other.as_bytes()[0],
            other => {
                return Err(IngestError::configuration(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    other
                )));
            }
        };
        Ok(Some(byte))
    }

    /// True when the delimiter is set to `auto`.
    pub fn wants_delimiter_detection(&self) -> bool {
        self.delimiter
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(AUTO_DELIMITER))
    }

    /// File path, or a configuration error naming the kind.
    pub fn require_file_path(&self) -> crate::Result<&std::path::Path> {
        self.file_path.as_deref().ok_or_else(|| {
            IngestError::configuration(format!(
                "file_path is required for {} sources",
                self.source_kind
            ))
        })
    }

    /// Validates that the location matching the kind is present.
    ///
    /// # Errors
    /// Returns error if the kind is unknown, the required location is
    /// missing, or the delimiter is not a single character.
    pub fn validate(&self) -> crate::Result<()> {
        let kind = self
            .kind()
            .ok_or_else(|| IngestError::unsupported_kind(self.source_kind.clone()))?;

        if kind.is_file_based() {
            self.require_file_path()?;
        } else if self
            .connection_string
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            return Err(IngestError::configuration(
                "connection_string is required for database sources",
            ));
        }

        self.delimiter_byte()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_validation() {
        assert!(SourceConfig::file("csv", "a.csv").validate().is_ok());

        let missing = SourceConfig {
            source_kind: "json".to_string(),
            ..Default::default()
        };
        assert!(missing.validate().is_err());

        let unknown = SourceConfig::file("parquet", "a.parquet");
        assert!(matches!(
            unknown.validate(),
            Err(IngestError::UnsupportedSourceKind { .. })
        ));
    }

    #[test]
    fn test_database_config_validation() {
        assert!(
            SourceConfig::database("postgresql", "postgres://u:p@localhost/db")
                .validate()
                .is_ok()
        );
        assert!(SourceConfig::database("mysql", "  ").validate().is_err());
    }

    #[test]
    fn test_delimiter_parsing() {
        let base = SourceConfig::file("txt", "a.txt");
        assert_eq!(base.delimiter_byte().unwrap(), None);
        assert_eq!(base.clone().with_delimiter("\\t").delimiter_byte().unwrap(), Some(b'\t'));
        assert_eq!(base.clone().with_delimiter("|").delimiter_byte().unwrap(), Some(b'|'));
        assert_eq!(base.clone().with_delimiter("semicolon").delimiter_byte().unwrap(), Some(b';'));
        assert_eq!(base.clone().with_delimiter("auto").delimiter_byte().unwrap(), None);
        assert!(base.clone().with_delimiter("auto").wants_delimiter_detection());
        assert!(base.with_delimiter("::").delimiter_byte().is_err());
    }

    #[test]
    fn test_debug_and_display_redact_credentials() {
        let config = SourceConfig::database("postgresql", "postgres://admin:hunter2@db/app");

        let debug = format!("{:?}", config);
        let display = format!("{}", config);

        assert!(!debug.contains("hunter2"));
        assert!(!display.contains("hunter2"));
        assert!(display.contains("admin:****"));
    }

    #[test]
    fn test_serde_skips_unset_fields() {
        let config = SourceConfig::file("csv", "a.csv").with_has_header(false);
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["source_kind"], "csv");
        assert_eq!(value["has_header"], false);
        assert!(value.get("connection_string").is_none());

        let back: SourceConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }
}

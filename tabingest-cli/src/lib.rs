//! Library module for the `tabingest` command-line tool.
//!
//! Argument definitions and command handlers live here so they can be
//! exercised without spawning the binary. `main.rs` only parses, sets up
//! logging and dispatches.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tabingest_core::{SourceConfig, SourceKind, SyncConfig};

#[derive(Debug, Parser)]
#[command(name = "tabingest")]
#[command(about = "Normalize tabular sources into one schema and row format")]
#[command(version)]
#[command(long_about = "
tabingest - read heterogeneous tabular sources as normalized rows

Every source is described as tables and typed columns, and its rows are
returned in one shape regardless of origin.

SUPPORTED SOURCES:
- Delimited files (csv)
- Spreadsheets (excel) [if compiled with --features spreadsheet]
- JSON documents (json)
- Plain text tables (txt, with --delimiter auto detection)
- SQL dump files (sql)
- Live databases (postgresql, mysql, sqlite)

EXAMPLES:
  tabingest schema csv --file users.csv
  tabingest data sql --file backup.sql --per-table --limit 20
  tabingest data sqlite --database-url sqlite:///data/app.db --table users
  tabingest register --registry sources.json --id 1 csv --file users.csv
  tabingest sync --registry sources.json --rows-dir rows/
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Describe the tables and columns of a source
    Schema(SchemaArgs),
    /// Read rows from a source
    Data(DataArgs),
    /// Add or replace a source in a registry file
    Register(RegisterArgs),
    /// Synchronize registered sources into a row directory
    Sync(SyncArgs),
    /// List supported source kinds
    Kinds,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    pub quiet: bool,
}

/// Location and parsing options shared by every source command.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Source kind (csv, excel, json, txt, sql, postgresql, mysql, sqlite)
    pub kind: String,

    /// Path of a file source
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Connection string of a database source
    #[arg(
        long,
        env = "DATABASE_URL",
        hide_env_values = true,
        help = "Database connection string (credentials are redacted in logs)"
    )]
    pub database_url: Option<String>,

    /// Encoding tried before detection
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,

    /// Field delimiter, or `auto` for plain text detection
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Treat the first row as data
    #[arg(long)]
    pub no_header: bool,

    /// Spreadsheet sheet to read
    #[arg(long)]
    pub sheet: Option<String>,

    /// Database table to read
    #[arg(long)]
    pub table: Option<String>,
}

impl SourceArgs {
    /// Builds the source configuration.
    ///
    /// The connection string is only carried for database kinds, so a
    /// `DATABASE_URL` in the environment never leaks into file sources.
    pub fn to_config(&self) -> SourceConfig {
        let is_database = SourceKind::from_tag(&self.kind)
            .is_some_and(|kind| kind == SourceKind::RelationalConnection);

        SourceConfig {
            source_kind: self.kind.clone(),
            file_path: self.file.clone(),
            connection_string: self.database_url.clone().filter(|_| is_database),
            declared_encoding: self.encoding.clone(),
            delimiter: self.delimiter.clone(),
            has_header: self.no_header.then_some(false),
            sheet_name: self.sheet.clone(),
            table: self.table.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file path (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Shape of `data` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DataFormat {
    /// One JSON object per row
    Records,
    /// Column list plus row arrays
    Frame,
}

#[derive(Debug, Args)]
pub struct DataArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum rows to return
    #[arg(long)]
    pub limit: Option<usize>,

    /// Emit each dump table separately (sql sources only)
    #[arg(long)]
    pub per_table: bool,

    #[arg(long, value_enum, default_value = "records")]
    pub format: DataFormat,

    /// Output file path (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Registry file to update
    #[arg(long, value_name = "FILE")]
    pub registry: PathBuf,

    /// Source id
    #[arg(long)]
    pub id: u64,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Register the source as inactive
    #[arg(long)]
    pub inactive: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Registry file listing sources
    #[arg(long, value_name = "FILE")]
    pub registry: PathBuf,

    /// Directory receiving `source_<id>.json` row files
    #[arg(long, value_name = "DIR", default_value = "rows")]
    pub rows_dir: PathBuf,

    /// Sources to sync; every active source when omitted
    pub source_ids: Vec<u64>,

    /// Values larger than this many bytes count toward redaction
    #[arg(long, value_name = "BYTES")]
    pub redaction_threshold: Option<usize>,

    /// Non-null values sampled per column for redaction
    #[arg(long)]
    pub sample_size: Option<usize>,

    /// Row cap for database sources
    #[arg(long)]
    pub row_limit: Option<usize>,

    /// Write sync outcomes to this file (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl SyncArgs {
    /// Sync settings with command-line overrides applied.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        if let Some(bytes) = self.redaction_threshold {
            config = config.with_redaction_threshold_bytes(bytes);
        }
        if let Some(size) = self.sample_size {
            config = config.with_redaction_sample_size(size);
        }
        if let Some(limit) = self.row_limit {
            config = config.with_database_row_limit(limit);
        }
        config
    }
}

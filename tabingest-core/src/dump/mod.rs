//! Relational dump parsing.
//!
//! A [`DumpDocument`] recovers tables and rows from `CREATE TABLE` /
//! `INSERT INTO` text without a SQL grammar. Parsing advances through an
//! explicit state machine:
//!
//! ```text
//! Unparsed -> TablesExtracted -> RowsExtracted -> Ready
//! ```
//!
//! # Module Structure
//! - `encoding`: Encoding recovery by trial decode
//! - `tokenizer`: Quote- and paren-aware scanner
//! - `statements`: Comment stripping, statement splitting, header patterns
//! - `columns`: `CREATE TABLE` body parsing
//! - `type_mapping`: Raw SQL type to generic type
//! - `inserts`: `VALUES` clause parsing with a regex fallback

use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::models::{
    ColumnDescriptor, NormalizedFrame, Row, SOURCE_TABLE_COLUMN, SourceKind, SourceSchema,
    TableDescriptor,
};

pub mod columns;
pub mod encoding;
pub mod inserts;
pub mod statements;
pub mod tokenizer;
pub mod type_mapping;

use statements::{StatementKind, StatementPatterns};

/// Parse progress of a [`DumpDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    Unparsed,
    TablesExtracted,
    RowsExtracted,
    Ready,
}

impl std::fmt::Display for DumpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DumpState::Unparsed => write!(f, "Unparsed"),
            DumpState::TablesExtracted => write!(f, "TablesExtracted"),
            DumpState::RowsExtracted => write!(f, "RowsExtracted"),
            DumpState::Ready => write!(f, "Ready"),
        }
    }
}

#[derive(Debug)]
struct ParsedTable {
    descriptor: TableDescriptor,
    rows: Vec<Row>,
    malformed_inserts: usize,
}

impl ParsedTable {
    fn new(descriptor: TableDescriptor) -> Self {
        Self {
            descriptor,
            rows: Vec::new(),
            malformed_inserts: 0,
        }
    }

    fn arity(&self) -> usize {
        self.descriptor.columns().len()
    }
}

/// Tables, rows and encoding recovered from one dump.
#[derive(Debug)]
pub struct DumpDocument {
    state: DumpState,
    encoding: String,
    text: String,
    inserts: Vec<String>,
    tables: Vec<ParsedTable>,
    warnings: Vec<String>,
}

impl DumpDocument {
    /// Creates an unparsed document from already decoded text.
    pub fn new(text: String, encoding: impl Into<String>) -> Self {
        Self {
            state: DumpState::Unparsed,
            encoding: encoding.into(),
            text,
            inserts: Vec::new(),
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Decodes raw bytes and runs every parse stage.
    ///
    /// # Errors
    /// Returns [`IngestError::EncodingExhausted`] when the bytes cannot be
    /// decoded. Malformed statements never fail the parse; they surface as
    /// warnings and zero-row tables.
    pub fn parse(bytes: &[u8], declared_encoding: Option<&str>) -> Result<Self> {
        let resolved = encoding::resolve(bytes, declared_encoding)?;
        let mut document = Self::new(resolved.text, resolved.encoding);
        document.extract_tables()?;
        document.extract_rows()?;
        document.finish()?;
        Ok(document)
    }

    /// Current stage of the parse.
    pub fn state(&self) -> DumpState {
        self.state
    }

    /// Encoding the dump text was decoded with.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Non-fatal problems recorded while parsing.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn expect_state(&self, expected: DumpState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(IngestError::InvalidState {
                expected: expected.to_string(),
                found: self.state.to_string(),
            })
        }
    }

    fn add_warning(&mut self, warning: String) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn find_table(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.descriptor.name().eq_ignore_ascii_case(name))
    }

    /// `Unparsed -> TablesExtracted`: splits statements and parses every
    /// `CREATE TABLE`. `INSERT` statements are kept for the next stage.
    pub fn extract_tables(&mut self) -> Result<()> {
        self.expect_state(DumpState::Unparsed)?;

        let text = std::mem::take(&mut self.text);
        let patterns = StatementPatterns::instance();
        let mut skipped = 0usize;

        for statement in statements::split_statements(&text) {
            match statements::classify(&statement) {
                StatementKind::CreateTable => self.parse_create_table(patterns, &statement),
                StatementKind::Insert => self.inserts.push(statement),
                StatementKind::Other => skipped += 1,
            }
        }

        debug!(
            "Extracted {} tables, {} INSERT statements, skipped {} other statements",
            self.tables.len(),
            self.inserts.len(),
            skipped
        );
        self.state = DumpState::TablesExtracted;
        Ok(())
    }

    fn parse_create_table(&mut self, patterns: &StatementPatterns, statement: &str) {
        let Some(captures) = patterns.create_table.captures(statement) else {
            self.add_warning(format!(
                "Skipping CREATE TABLE without a column list: {}",
                preview(statement)
            ));
            return;
        };

        let name = statements::table_name(&captures["name"]);
        if self.find_table(&name).is_some() {
            self.add_warning(format!("Duplicate CREATE TABLE for `{}` ignored", name));
            return;
        }

        let body = match tokenizer::split(&captures["body"]) {
            Ok(tokens) => match tokens.into_iter().next() {
                Some(tokenizer::Token::Group(inner)) => inner,
                _ => {
                    self.add_warning(format!("CREATE TABLE `{}` has no column list", name));
                    return;
                }
            },
            Err(e) => {
                self.add_warning(format!("CREATE TABLE `{}` could not be parsed: {}", name, e));
                return;
            }
        };

        match columns::parse(&body) {
            Ok(definitions) => {
                let descriptors = definitions
                    .into_iter()
                    .map(columns::ColumnDefinitionRaw::into_descriptor)
                    .collect();
                self.tables
                    .push(ParsedTable::new(TableDescriptor::new(name, descriptors)));
            }
            Err(e) => {
                self.add_warning(format!("CREATE TABLE `{}` could not be parsed: {}", name, e));
            }
        }
    }

    /// `TablesExtracted -> RowsExtracted`: folds every `INSERT` into its
    /// table and sets row counts.
    pub fn extract_rows(&mut self) -> Result<()> {
        self.expect_state(DumpState::TablesExtracted)?;

        let patterns = StatementPatterns::instance();
        for statement in std::mem::take(&mut self.inserts) {
            self.fold_insert(patterns, &statement);
        }

        let mut warnings = Vec::new();
        for table in &mut self.tables {
            if table.malformed_inserts > 0 {
                warnings.push(format!(
                    "Table `{}`: {} malformed INSERT statement(s); reporting zero rows",
                    table.descriptor.name(),
                    table.malformed_inserts
                ));
                table.rows.clear();
            }
            let descriptor = std::mem::replace(
                &mut table.descriptor,
                TableDescriptor::new(String::new(), Vec::new()),
            );
            table.descriptor = descriptor.with_row_count(table.rows.len() as u64);
        }
        for warning in warnings {
            self.add_warning(warning);
        }

        self.state = DumpState::RowsExtracted;
        Ok(())
    }

    fn fold_insert(&mut self, patterns: &StatementPatterns, statement: &str) {
        let Some(captures) = patterns.insert.captures(statement) else {
            self.add_warning(format!(
                "Skipping INSERT without a VALUES clause: {}",
                preview(statement)
            ));
            return;
        };

        let name = statements::table_name(&captures["name"]);
        let explicit_columns = match captures.name("columns") {
            Some(list) => match column_list(list.as_str()) {
                Ok(names) => Some(names),
                Err(e) => {
                    self.add_warning(format!("INSERT into `{}` has a malformed column list: {}", name, e));
                    None
                }
            },
            None => None,
        };
        let parsed = inserts::parse(&captures["values"]);

        let index = match self.find_table(&name) {
            Some(index) => index,
            None => {
                let columns = implicit_columns(explicit_columns.as_deref(), parsed.as_ref().ok());
                info!("Creating implicit table `{}` with {} columns", name, columns.len());
                self.tables
                    .push(ParsedTable::new(TableDescriptor::new(name.clone(), columns)));
                self.tables.len() - 1
            }
        };

        let rows = match parsed {
            Ok(rows) => rows,
            Err(e) => {
                debug!("INSERT into `{}` is malformed: {}", name, e);
                self.tables[index].malformed_inserts += 1;
                return;
            }
        };

        let (aligned, adjusted) = match explicit_columns {
            Some(names) => self.align_by_name(index, &names, rows),
            None => align_by_position(self.tables[index].arity(), rows),
        };
        if adjusted > 0 {
            self.add_warning(format!(
                "Table `{}`: {} row(s) did not match the column count and were padded or truncated",
                name, adjusted
            ));
        }
        self.tables[index].rows.extend(aligned);
    }

    fn align_by_name(&mut self, index: usize, names: &[String], rows: Vec<Row>) -> (Vec<Row>, usize) {
        let table = &self.tables[index];
        let targets: Vec<Option<usize>> = names
            .iter()
            .map(|name| table.descriptor.column_index(name))
            .collect();
        let arity = table.arity();
        let table_name = table.descriptor.name().to_string();

        let unknown: Vec<&String> = names
            .iter()
            .zip(&targets)
            .filter(|(_, target)| target.is_none())
            .map(|(name, _)| name)
            .collect();
        if !unknown.is_empty() {
            self.add_warning(format!(
                "Table `{}`: INSERT names unknown column(s) {:?}; values dropped",
                table_name, unknown
            ));
        }

        let mut adjusted = 0;
        let aligned = rows
            .into_iter()
            .map(|row| {
                if row.len() != names.len() {
                    adjusted += 1;
                }
                let mut aligned: Row = vec![None; arity];
                for (value, target) in row.into_iter().zip(&targets) {
                    if let Some(position) = target {
                        aligned[*position] = value;
                    }
                }
                aligned
            })
            .collect();
        (aligned, adjusted)
    }

    /// `RowsExtracted -> Ready`.
    pub fn finish(&mut self) -> Result<()> {
        self.expect_state(DumpState::RowsExtracted)?;
        self.state = DumpState::Ready;
        info!(
            "Parsed dump ({}): {} tables, {} rows",
            self.encoding,
            self.tables.len(),
            self.tables.iter().map(|t| t.rows.len()).sum::<usize>()
        );
        Ok(())
    }

    /// Table descriptors in declaration order.
    pub fn tables(&self) -> Result<Vec<&TableDescriptor>> {
        self.expect_state(DumpState::Ready)?;
        Ok(self.tables.iter().map(|t| &t.descriptor).collect())
    }

    /// Table names in declaration order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.expect_state(DumpState::Ready)?;
        Ok(self
            .tables
            .iter()
            .map(|t| t.descriptor.name().to_string())
            .collect())
    }

    /// Rows of one table, matched case-insensitively.
    pub fn rows(&self, table: &str) -> Result<Option<&[Row]>> {
        self.expect_state(DumpState::Ready)?;
        Ok(self.find_table(table).map(|i| self.tables[i].rows.as_slice()))
    }

    /// Schema record for the whole dump.
    pub fn to_schema(&self) -> Result<SourceSchema> {
        self.expect_state(DumpState::Ready)?;
        let mut schema = SourceSchema::new(SourceKind::SqlDump);
        schema.encoding = Some(self.encoding.clone());
        schema.tables = self.tables.iter().map(|t| t.descriptor.clone()).collect();
        schema.warnings = self.warnings.clone();
        Ok(schema)
    }

    /// All tables combined into one frame led by `_source_table`.
    ///
    /// Columns are the ordered union of every table's columns; cells a
    /// table does not have are `null`.
    pub fn to_frame(&self, limit: Option<usize>) -> Result<NormalizedFrame> {
        self.expect_state(DumpState::Ready)?;

        let mut columns = vec![SOURCE_TABLE_COLUMN.to_string()];
        for table in &self.tables {
            for column in table.descriptor.columns() {
                if !columns.iter().any(|c| c == column.name()) {
                    columns.push(column.name().to_string());
                }
            }
        }

        let mut frame = NormalizedFrame::new(columns);
        let limit = limit.unwrap_or(usize::MAX);
        'tables: for table in &self.tables {
            let positions: Vec<usize> = table
                .descriptor
                .columns()
                .iter()
                .filter_map(|c| frame.column_index(c.name()))
                .collect();

            for row in &table.rows {
                if frame.row_count() >= limit {
                    break 'tables;
                }
                let mut values = vec![serde_json::Value::Null; frame.columns.len()];
                values[0] = serde_json::Value::String(table.descriptor.name().to_string());
                for (value, position) in row.iter().zip(&positions) {
                    values[*position] = cell(value);
                }
                frame.push_row(values);
            }
        }

        Ok(frame)
    }

    /// One table's rows as a frame, without the `_source_table` column.
    ///
    /// # Errors
    /// Returns [`IngestError::Configuration`] when the table does not exist.
    pub fn table_frame(&self, name: &str, limit: Option<usize>) -> Result<NormalizedFrame> {
        self.expect_state(DumpState::Ready)?;
        let table = self
            .find_table(name)
            .map(|i| &self.tables[i])
            .ok_or_else(|| IngestError::configuration(format!("Table `{}` not found in dump", name)))?;

        let mut frame = NormalizedFrame::new(table.descriptor.column_names());
        for row in table.rows.iter().take(limit.unwrap_or(usize::MAX)) {
            frame.push_row(row.iter().map(cell).collect());
        }
        Ok(frame)
    }
}

fn cell(value: &Option<String>) -> serde_json::Value {
    value
        .as_ref()
        .map_or(serde_json::Value::Null, |s| serde_json::Value::String(s.clone()))
}

fn preview(statement: &str) -> String {
    let head: String = statement.chars().take(60).collect();
    if head.len() < statement.len() {
        format!("{}...", head)
    } else {
        head
    }
}

fn column_list(list: &str) -> std::result::Result<Vec<String>, tokenizer::SplitError> {
    Ok(tokenizer::split_on_commas(tokenizer::split(list)?)
        .into_iter()
        .filter_map(|segment| match segment.first() {
            Some(tokenizer::Token::Quoted(name)) => Some(name.clone()),
            Some(tokenizer::Token::Bare(name)) => Some(statements::table_name(name)),
            _ => None,
        })
        .collect())
}

/// Columns for a table that only appears in INSERT statements.
fn implicit_columns(explicit: Option<&[String]>, rows: Option<&Vec<Row>>) -> Vec<ColumnDescriptor> {
    match explicit {
        Some(names) => names
            .iter()
            .map(|name| ColumnDescriptor::new(name.clone(), ""))
            .collect(),
        None => {
            let width = rows.and_then(|rows| rows.first()).map_or(0, Vec::len);
            (1..=width)
                .map(|i| ColumnDescriptor::new(format!("col_{}", i), ""))
                .collect()
        }
    }
}

fn align_by_position(arity: usize, rows: Vec<Row>) -> (Vec<Row>, usize) {
    let mut adjusted = 0;
    let aligned = rows
        .into_iter()
        .map(|mut row| {
            if row.len() != arity {
                adjusted += 1;
                row.resize(arity, None);
            }
            row
        })
        .collect();
    (aligned, adjusted)
}

//! SQL dump strategy wrapping [`DumpDocument`].

use async_trait::async_trait;

use super::helpers;
use super::{SourceConfig, SourceStrategy};
use crate::dump::DumpDocument;
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

/// Reads a `.sql` dump file into memory and exposes its tables.
///
/// `get_data` concatenates every table with a `_source_table` column;
/// [`SqlDumpStrategy::table_data`] reads a single table.
pub struct SqlDumpStrategy {
    config: SourceConfig,
    document: Option<DumpDocument>,
}

impl SqlDumpStrategy {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            document: None,
        }
    }

    async fn load(&self) -> Result<DumpDocument> {
        let path = self.config.require_file_path()?;
        let bytes = helpers::read_source_file(path).await?;
        let document = DumpDocument::parse(&bytes, self.config.declared_encoding.as_deref())?;

        tracing::info!(
            "Parsed SQL dump {} ({}, {} tables)",
            path.display(),
            document.encoding(),
            document.table_names()?.len()
        );
        Ok(document)
    }

    async fn document(&mut self) -> Result<&DumpDocument> {
        let document = match self.document.take() {
            Some(document) => document,
            None => self.load().await?,
        };
        Ok(self.document.insert(document))
    }

    /// Table names in declaration order.
    pub async fn table_names(&mut self) -> Result<Vec<String>> {
        self.document().await?.table_names()
    }

    /// Rows of one table, without the `_source_table` column.
    pub async fn table_data(&mut self, name: &str, limit: Option<usize>) -> Result<NormalizedFrame> {
        self.document().await?.table_frame(name, limit)
    }

    /// Every table as its own frame, in declaration order. `limit` applies
    /// per table.
    pub async fn all_table_data(
        &mut self,
        limit: Option<usize>,
    ) -> Result<Vec<(String, NormalizedFrame)>> {
        let document = self.document().await?;
        document
            .table_names()?
            .into_iter()
            .map(|name| {
                let frame = document.table_frame(&name, limit)?;
                Ok((name, frame))
            })
            .collect()
    }
}

#[async_trait]
impl SourceStrategy for SqlDumpStrategy {
    async fn connect(&mut self) -> Result<()> {
        self.document().await.map(|_| ())
    }

    async fn get_schema(&mut self) -> Result<SourceSchema> {
        self.document().await?.to_schema()
    }

    async fn get_data(&mut self, limit: Option<usize>) -> Result<NormalizedFrame> {
        self.document().await?.to_frame(limit)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.document = None;
        Ok(())
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::SqlDump
    }

    fn is_connected(&self) -> bool {
        self.document.is_some()
    }
}

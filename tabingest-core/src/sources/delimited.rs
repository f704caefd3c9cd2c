//! Delimited-file (CSV) strategy.

use async_trait::async_trait;

use super::helpers::{self, LoadedSource};
use super::{SourceConfig, SourceStrategy};
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

/// Reads a delimited file with the `csv` crate.
///
/// Defaults: `,` delimiter, header row present, UTF-8 with latin-1
/// fallback unless an encoding is declared.
pub struct DelimitedFileStrategy {
    config: SourceConfig,
    loaded: Option<LoadedSource>,
}

impl DelimitedFileStrategy {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            loaded: None,
        }
    }

    async fn load(&self) -> Result<LoadedSource> {
        let path = self.config.require_file_path()?;
        let delimiter = self.config.delimiter_byte()?.unwrap_or(b',');
        let bytes = helpers::read_source_file(path).await?;
        let (text, encoding) =
            helpers::decode_text(&bytes, self.config.declared_encoding.as_deref())?;

        let frame = helpers::parse_delimited(
            &text,
            delimiter,
            self.config.has_header_or_default(),
            true,
        )?;

        let mut loaded = LoadedSource::single_table(
            SourceKind::DelimitedFile,
            helpers::table_name_for(path),
            frame,
            helpers::classify_text,
        );
        loaded.schema.encoding = Some(encoding);
        loaded.schema.delimiter = Some(char::from(delimiter).to_string());

        tracing::info!(
            "Loaded {} rows from delimited file {}",
            loaded.frame.row_count(),
            path.display()
        );
        Ok(loaded)
    }

    async fn loaded(&mut self) -> Result<&LoadedSource> {
        let loaded = match self.loaded.take() {
            Some(loaded) => loaded,
            None => self.load().await?,
        };
        Ok(self.loaded.insert(loaded))
    }
}

#[async_trait]
impl SourceStrategy for DelimitedFileStrategy {
    async fn connect(&mut self) -> Result<()> {
        self.loaded().await.map(|_| ())
    }

    async fn get_schema(&mut self) -> Result<SourceSchema> {
        Ok(self.loaded().await?.schema.clone())
    }

    async fn get_data(&mut self, limit: Option<usize>) -> Result<NormalizedFrame> {
        Ok(self.loaded().await?.data(limit))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.loaded = None;
        Ok(())
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::DelimitedFile
    }

    fn is_connected(&self) -> bool {
        self.loaded.is_some()
    }
}

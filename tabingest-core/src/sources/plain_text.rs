//! Plain-text strategy for delimiter-separated text without quoting.

use async_trait::async_trait;

use super::helpers::{self, LoadedSource};
use super::{SourceConfig, SourceStrategy};
use crate::models::{NormalizedFrame, SourceKind, SourceSchema};
use crate::Result;

/// Delimiters considered by auto-detection, in tie-break order.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b'\t', b',', b';', b'|'];

/// Lines sampled by auto-detection.
const DETECTION_LINES: usize = 5;

/// Reads a text file split on a single delimiter.
///
/// Defaults to tab. Setting the delimiter to `auto` picks among
/// [`CANDIDATE_DELIMITERS`] from the first lines of the file.
pub struct PlainTextStrategy {
    config: SourceConfig,
    loaded: Option<LoadedSource>,
}

impl PlainTextStrategy {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            loaded: None,
        }
    }

    async fn load(&self) -> Result<LoadedSource> {
        let path = self.config.require_file_path()?;
        let bytes = helpers::read_source_file(path).await?;
        let (text, encoding) =
            helpers::decode_text(&bytes, self.config.declared_encoding.as_deref())?;

        let delimiter = if self.config.wants_delimiter_detection() {
            let detected = detect_delimiter(&text);
            tracing::debug!("Detected delimiter {:?} in {}", char::from(detected), path.display());
            detected
        } else {
            self.config.delimiter_byte()?.unwrap_or(b'\t')
        };

        let frame = helpers::parse_delimited(
            &text,
            delimiter,
            self.config.has_header_or_default(),
            false,
        )?;

        let mut loaded = LoadedSource::single_table(
            SourceKind::PlainText,
            helpers::table_name_for(path),
            frame,
            helpers::classify_text,
        );
        loaded.schema.encoding = Some(encoding);
        loaded.schema.delimiter = Some(char::from(delimiter).to_string());

        tracing::info!(
            "Loaded {} rows from text file {}",
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

/// Picks the delimiter from the first non-empty lines.
///
/// A candidate appearing the same non-zero number of times on every sampled
/// line wins, highest count first. Otherwise the most frequent candidate
/// wins. Tab when none appears.
pub fn detect_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(DETECTION_LINES)
        .collect();

    let counts: Vec<(u8, Vec<usize>)> = CANDIDATE_DELIMITERS
        .iter()
        .map(|&candidate| {
            let per_line = lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == candidate).count())
                .collect();
            (candidate, per_line)
        })
        .collect();

    let consistent = counts
        .iter()
        .filter_map(|(candidate, per_line)| {
            let first = *per_line.first()?;
            (first > 0 && per_line.iter().all(|&c| c == first)).then_some((*candidate, first))
        })
        .fold(None, |best: Option<(u8, usize)>, (candidate, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((candidate, count)),
        });

    if let Some((candidate, _)) = consistent {
        return candidate;
    }

    counts
        .iter()
        .map(|(candidate, per_line)| (*candidate, per_line.iter().sum::<usize>()))
        .filter(|(_, total)| *total > 0)
        .fold(None, |best: Option<(u8, usize)>, (candidate, total)| match best {
            Some((_, best_total)) if best_total >= total => best,
            _ => Some((candidate, total)),
        })
        .map_or(b'\t', |(candidate, _)| candidate)
}

#[async_trait]
impl SourceStrategy for PlainTextStrategy {
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
        SourceKind::PlainText
    }

    fn is_connected(&self) -> bool {
        self.loaded.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_consistent_delimiter() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3\n"), b'|');
        assert_eq!(detect_delimiter("a;b\n1;2\n"), b';');
        assert_eq!(detect_delimiter("a\tb\n1\t2\n"), b'\t');
    }

    #[test]
    fn test_detect_prefers_consistent_over_frequent() {
        // commas vary per line, semicolons are steady
        let text = "name;note\nAda;x,y,z\nBob;w\n";
        assert_eq!(detect_delimiter(text), b';');
    }

    #[test]
    fn test_detect_falls_back_to_tab() {
        assert_eq!(detect_delimiter("single column\nvalues only\n"), b'\t');
        assert_eq!(detect_delimiter(""), b'\t');
    }

    #[test]
    fn test_detect_only_samples_leading_lines() {
        let mut text = String::from("a,b\n1,2\n3,4\n5,6\n7,8\n");
        text.push_str("x|y|z|w\n");
        assert_eq!(detect_delimiter(&text), b',');
    }
}

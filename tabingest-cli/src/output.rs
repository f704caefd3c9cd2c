//! JSON output for command results.

use std::path::Path;

use serde::Serialize;
use tabingest_core::{IngestError, Result};

/// Serializes `value` as pretty JSON to `path`, or to stdout when `None`.
///
/// # Errors
/// Returns error if serialization fails or the file cannot be written.
pub async fn write_json<T: Serialize + ?Sized>(value: &T, path: Option<&Path>) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)
        .map_err(|e| IngestError::serialization("Failed to serialize output", e))?;
    json.push('\n');

    match path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .map_err(|e| IngestError::Io {
                    context: format!("Failed to write to {}", path.display()),
                    source: e,
                })?;
            tracing::info!("Output written to {}", path.display());
        }
        None => print!("{}", json),
    }
    Ok(())
}

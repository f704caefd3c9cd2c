//! Column-level redaction of large or binary values before storage.
//!
//! A column is redacted when more than half of its sampled non-null values
//! look like binary payloads (image data URIs, base64 blobs) or exceed the
//! size threshold. Redaction replaces every value in the column.

use serde_json::Value as JsonValue;

use crate::models::NormalizedFrame;

/// Prefixes marking inline image payloads (data URI, base64 PNG, base64 JPEG).
pub const IMAGE_PREFIXES: [&str; 3] = ["data:image/", "iVBOR", "/9j/"];

/// Characters inspected by the base64 check.
pub const BASE64_PROBE_CHARS: usize = 100;

/// Placeholder for null values in a redacted column.
pub const EMPTY_PLACEHOLDER: &str = "[redacted: empty]";

/// Placeholder for a redacted value of `size` bytes.
pub fn binary_placeholder(size: usize) -> String {
    format!("[redacted binary data: {} bytes]", size)
}

/// True when a value is large or looks like encoded binary data.
pub fn is_large_or_binary(value: &str, threshold_bytes: usize) -> bool {
    if value.len() > threshold_bytes {
        return true;
    }
    if IMAGE_PREFIXES.iter().any(|prefix| value.starts_with(prefix)) {
        return true;
    }
    value.len() > BASE64_PROBE_CHARS
        && value
            .chars()
            .take(BASE64_PROBE_CHARS)
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
}

fn text_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Decides per column whether its sample qualifies for redaction.
pub fn columns_to_redact(
    frame: &NormalizedFrame,
    sample_size: usize,
    threshold_bytes: usize,
) -> Vec<usize> {
    (0..frame.columns.len())
        .filter(|&index| {
            let sample: Vec<String> = frame
                .rows
                .iter()
                .filter_map(|row| row.get(index).and_then(text_of))
                .take(sample_size)
                .collect();
            let qualifying = sample
                .iter()
                .filter(|value| is_large_or_binary(value, threshold_bytes))
                .count();
            !sample.is_empty() && qualifying * 2 > sample.len()
        })
        .collect()
}

/// Replaces every value in qualifying columns with a placeholder.
///
/// Returns the names of the redacted columns.
pub fn redact_frame(
    frame: &mut NormalizedFrame,
    sample_size: usize,
    threshold_bytes: usize,
) -> Vec<String> {
    let indices = columns_to_redact(frame, sample_size, threshold_bytes);

    for row in &mut frame.rows {
        for &index in &indices {
            if let Some(value) = row.get_mut(index) {
                let placeholder = match text_of(value) {
                    None => EMPTY_PLACEHOLDER.to_string(),
                    Some(text) => binary_placeholder(text.len()),
                };
                *value = JsonValue::String(placeholder);
            }
        }
    }

    let names: Vec<String> = indices
        .iter()
        .filter_map(|&index| frame.columns.get(index).cloned())
        .collect();
    for name in &names {
        tracing::warn!("Redacted large or binary column {}", name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> NormalizedFrame {
        let mut frame = NormalizedFrame::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            frame.push_row(row);
        }
        frame
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_large_or_binary("data:image/png;base64,AAAA", 1024));
        assert!(is_large_or_binary("iVBORw0KGgo", 1024));
        assert!(is_large_or_binary("/9j/4AAQSkZJRg", 1024));
        assert!(is_large_or_binary(&"QUJD".repeat(30), 1024));
        assert!(is_large_or_binary(&"a b ".repeat(300), 1024));

        assert!(!is_large_or_binary("hello world", 1024));
        assert!(!is_large_or_binary(&"QUJD".repeat(25), 1024));
        assert!(!is_large_or_binary(&"word ".repeat(30), 1024));
    }

    #[test]
    fn test_large_column_is_redacted_small_untouched() {
        let big = "x ".repeat(6000);
        let mut frame = frame(
            &["id", "blob"],
            vec![
                vec![json!(1), json!(big.clone())],
                vec![json!(2), json!(big.clone())],
                vec![json!(3), json!(null)],
            ],
        );

        let redacted = redact_frame(&mut frame, 10, 10 * 1024);

        assert_eq!(redacted, vec!["blob"]);
        assert_eq!(frame.rows[0][0], json!(1));
        assert_eq!(frame.rows[0][1], json!(binary_placeholder(big.len())));
        assert_eq!(frame.rows[2][1], json!(EMPTY_PLACEHOLDER));
    }

    #[test]
    fn test_minority_binary_column_is_kept() {
        let mut frame = frame(
            &["note"],
            vec![
                vec![json!("data:image/png;base64,AAAA")],
                vec![json!("plain")],
                vec![json!("text")],
            ],
        );

        assert!(redact_frame(&mut frame, 10, 10 * 1024).is_empty());
        assert_eq!(frame.rows[1][0], json!("plain"));
    }

    #[test]
    fn test_sample_is_limited_to_leading_values() {
        let mut rows = vec![vec![json!("short")]; 10];
        rows.extend(vec![vec![json!("data:image/gif;base64,R0lG")]; 20]);
        let frame = frame(&["c"], rows);

        assert!(columns_to_redact(&frame, 10, 1024).is_empty());
    }

    #[test]
    fn test_all_null_column_is_not_redacted() {
        let frame = frame(&["c"], vec![vec![json!(null)], vec![json!(null)]]);
        assert!(columns_to_redact(&frame, 10, 1).is_empty());
    }
}

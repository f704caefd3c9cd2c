//! Text encoding recovery for dump files.
//!
//! Candidates are tried in order and accepted only when the bytes decode
//! without replacement characters and the decoded head contains a SQL
//! statement keyword.

use std::borrow::Cow;

use tracing::debug;

use crate::error::{IngestError, Result};

/// Number of leading characters searched for a SQL keyword.
pub const KEYWORD_SAMPLE_CHARS: usize = 16 * 1024;

/// Encodings tried after the declared and detected ones.
pub const FALLBACK_ENCODINGS: [&str; 5] = ["utf-16", "utf-8", "latin-1", "cp1252", "iso-8859-1"];

const SQL_KEYWORDS: [&str; 2] = ["CREATE TABLE", "INSERT INTO"];

/// Decoded dump text and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    pub text: String,
    pub encoding: String,
}

/// Decodes dump bytes with the first acceptable encoding.
///
/// Empty or whitespace-only input resolves as empty UTF-8 text.
///
/// # Errors
/// Returns [`IngestError::EncodingExhausted`] listing every candidate tried
/// when none both decodes cleanly and contains `CREATE TABLE` or
/// `INSERT INTO`.
pub fn resolve(bytes: &[u8], declared: Option<&str>) -> Result<ResolvedText> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResolvedText {
            text: String::new(),
            encoding: "utf-8".to_string(),
        });
    }

    let candidates = candidate_encodings(bytes, declared);
    for candidate in &candidates {
        let Some(text) = decode(bytes, candidate) else {
            debug!("Encoding {} rejected: malformed input", candidate);
            continue;
        };

        if contains_sql_keyword(&text) {
            debug!("Resolved dump encoding: {}", candidate);
            return Ok(ResolvedText {
                text: text.trim_start_matches('\u{feff}').to_string(),
                encoding: candidate.clone(),
            });
        }
        debug!("Encoding {} rejected: no SQL keyword in sample", candidate);
    }

    Err(IngestError::EncodingExhausted { tried: candidates })
}

/// Ordered, de-duplicated list of encodings to try.
pub fn candidate_encodings(bytes: &[u8], declared: Option<&str>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let declared = declared.map(normalize_label);
    let detected = bom_encoding(bytes).or_else(|| detect(bytes));

    for label in declared
        .into_iter()
        .chain(detected)
        .chain(FALLBACK_ENCODINGS.iter().map(|l| (*l).to_string()))
    {
        if !candidates.contains(&label) {
            candidates.push(label);
        }
    }
    candidates
}

/// Canonical spelling for common encoding labels.
pub fn normalize_label(label: &str) -> String {
    let lower = label.trim().to_ascii_lowercase().replace('_', "-");
    match lower.as_str() {
        "utf8" | "utf-8" | "ascii" | "us-ascii" => "utf-8".to_string(),
        "utf16" | "utf-16" => "utf-16".to_string(),
        "latin1" | "latin-1" | "l1" => "latin-1".to_string(),
        "iso8859-1" | "iso-8859-1" | "iso88591" => "iso-8859-1".to_string(),
        "cp1252" | "windows-1252" | "win1252" => "cp1252".to_string(),
        _ => lower,
    }
}

/// Decodes the whole input, returning `None` on any malformed sequence.
pub fn decode(bytes: &[u8], label: &str) -> Option<String> {
    match normalize_label(label).as_str() {
        "utf-16" => decode_utf16(bytes),
        "latin-1" | "iso-8859-1" => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        "cp1252" => decode_strict(encoding_rs::WINDOWS_1252, bytes),
        "utf-8" => {
            let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
            decode_strict(encoding_rs::UTF_8, bytes)
        }
        other => encoding_rs::Encoding::for_label(other.as_bytes())
            .and_then(|encoding| decode_strict(encoding, bytes)),
    }
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xfe, 0xff, rest @ ..] => decode_strict(encoding_rs::UTF_16BE, rest),
        [0xff, 0xfe, rest @ ..] => decode_strict(encoding_rs::UTF_16LE, rest),
        _ => decode_strict(encoding_rs::UTF_16LE, bytes),
    }
}

fn decode_strict(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn bom_encoding(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(b"\xef\xbb\xbf") {
        Some("utf-8".to_string())
    } else if bytes.starts_with(&[0xff, 0xfe]) || bytes.starts_with(&[0xfe, 0xff]) {
        Some("utf-16".to_string())
    } else {
        None
    }
}

fn contains_sql_keyword(text: &str) -> bool {
    let sample: String = text
        .chars()
        .take(KEYWORD_SAMPLE_CHARS)
        .collect::<String>()
        .to_ascii_uppercase();
    SQL_KEYWORDS.iter().any(|keyword| sample.contains(keyword))
}

#[cfg(feature = "charset-detection")]
fn detect(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() {
        return Some("utf-8".to_string());
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    Some(normalize_label(guess.name()))
}

#[cfg(not(feature = "charset-detection"))]
fn detect(_bytes: &[u8]) -> Option<String> {
    None
}

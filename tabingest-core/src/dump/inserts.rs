//! `INSERT ... VALUES` clause parsing.
//!
//! The structural path walks the token stream; a regex fallback recovers
//! flat rows when the clause cannot be tokenized.

use tracing::debug;

use super::statements::StatementPatterns;
use super::tokenizer::{SplitError, Token, render_tokens, split, split_on_commas};
use crate::error::{IngestError, Result};
use crate::models::Row;

/// Parses a `VALUES` clause into rows.
///
/// The structural result is used whenever it yields at least one row.
///
/// # Errors
/// Returns [`IngestError::MalformedFragment`] when neither path finds a row.
pub fn parse(values_clause: &str) -> Result<Vec<Row>> {
    match parse_structural(values_clause) {
        Ok(rows) if !rows.is_empty() => return Ok(rows),
        Ok(_) => debug!("Structural VALUES parse found no rows, trying fallback"),
        Err(e) => debug!("Structural VALUES parse failed ({}), trying fallback", e),
    }

    let rows = parse_fallback(values_clause);
    if rows.is_empty() {
        return Err(IngestError::malformed(format!(
            "no value rows in clause starting {:?}",
            values_clause.chars().take(40).collect::<String>()
        )));
    }
    Ok(rows)
}

/// Token-based parse: every top-level group is one row.
///
/// Stops at the first top-level word after the row list, such as
/// `ON DUPLICATE KEY UPDATE`.
pub fn parse_structural(values_clause: &str) -> std::result::Result<Vec<Row>, SplitError> {
    let mut rows = Vec::new();

    for token in split(values_clause)? {
        match token {
            Token::Group(_) => rows.push(parse_row(&token)?),
            Token::Comma => {}
            Token::Bare(_) | Token::Quoted(_) => break,
        }
    }

    Ok(rows)
}

fn parse_row(group: &Token) -> std::result::Result<Row, SplitError> {
    let tokens = group.group_tokens()?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    Ok(split_on_commas(tokens)
        .iter()
        .map(|segment| value_from_tokens(segment))
        .collect())
}

fn value_from_tokens(tokens: &[Token]) -> Option<String> {
    match tokens {
        [] => None,
        [Token::Bare(word)] if word.eq_ignore_ascii_case("NULL") => None,
        [Token::Bare(word)] | [Token::Quoted(word)] => Some(word.clone()),
        [Token::Bare(prefix), Token::Quoted(content)] if is_literal_prefix(prefix) => {
            Some(content.clone())
        }
        other => Some(render_tokens(other)),
    }
}

/// String literal introducers such as `N'..'`, `E'..'` and `_utf8mb4'..'`.
fn is_literal_prefix(prefix: &str) -> bool {
    matches!(prefix, "N" | "n" | "E" | "e" | "X" | "x" | "B" | "b")
        || (prefix.len() > 1
            && prefix.starts_with('_')
            && prefix[1..].chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Regex recovery: each `( ... )` run without nested parens is a row.
pub fn parse_fallback(values_clause: &str) -> Vec<Row> {
    StatementPatterns::instance()
        .value_group
        .captures_iter(values_clause)
        .filter_map(|captures| captures.get(1))
        .map(|inner| {
            inner
                .as_str()
                .split(',')
                .map(|raw| {
                    let value = raw.trim();
                    if value.eq_ignore_ascii_case("NULL") {
                        None
                    } else {
                        Some(strip_quotes(value).to_string())
                    }
                })
                .collect()
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

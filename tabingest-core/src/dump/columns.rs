//! `CREATE TABLE` body parsing.

use tracing::debug;

use super::tokenizer::{SplitError, Token, split, split_on_commas};
use crate::models::ColumnDescriptor;

/// Words that end the raw type of a column definition.
const COLUMN_KEYWORDS: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "PRIMARY",
    "AUTO_INCREMENT",
    "AUTOINCREMENT",
    "UNIQUE",
    "COMMENT",
    "REFERENCES",
    "CHECK",
    "COLLATE",
    "CHARSET",
    "GENERATED",
    "ON",
    "CONSTRAINT",
    "KEY",
    "IDENTITY",
];

/// Leading words of table-level constraint fragments.
const CONSTRAINT_LEADERS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "UNIQUE",
    "CONSTRAINT",
    "INDEX",
    "FOREIGN",
    "CHECK",
    "FULLTEXT",
    "SPATIAL",
];

const AUTO_INCREMENT_MARKERS: &[&str] = &["AUTO_INCREMENT", "AUTOINCREMENT", "IDENTITY"];

/// One column definition as written in the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinitionRaw {
    pub name: String,
    pub raw_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
}

impl ColumnDefinitionRaw {
    /// Builds the immutable descriptor, mapping the raw type.
    pub fn into_descriptor(self) -> ColumnDescriptor {
        ColumnDescriptor::new(self.name, self.raw_type)
            .with_nullable(self.nullable)
            .with_primary_key(self.is_primary_key)
            .with_auto_increment(self.is_auto_increment)
    }
}

/// Parses the text between the outer parentheses of a `CREATE TABLE`.
///
/// Constraint-only fragments and fragments without both a name and a type
/// are skipped; a table-level `PRIMARY KEY (..)` marks the columns it names.
/// Nullability comes from `NOT NULL` alone.
///
/// # Errors
/// Returns a [`SplitError`] when the body cannot be tokenized.
pub fn parse(table_body: &str) -> Result<Vec<ColumnDefinitionRaw>, SplitError> {
    let mut columns = Vec::new();
    let mut table_primary_key: Vec<String> = Vec::new();

    for fragment in split_on_commas(split(table_body)?) {
        let Some(first) = fragment.first() else {
            continue;
        };

        if CONSTRAINT_LEADERS.iter().any(|leader| first.is_keyword(leader)) {
            if let Some(names) = primary_key_columns(&fragment)? {
                table_primary_key.extend(names);
            }
            debug!("Skipping constraint fragment starting with {:?}", first);
            continue;
        }

        match parse_column(&fragment) {
            Some(column) => columns.push(column),
            None => debug!("Skipping column fragment without a name and type: {:?}", fragment),
        }
    }

    for column in &mut columns {
        if table_primary_key
            .iter()
            .any(|key| key.eq_ignore_ascii_case(&column.name))
        {
            column.is_primary_key = true;
        }
    }

    Ok(columns)
}

fn parse_column(fragment: &[Token]) -> Option<ColumnDefinitionRaw> {
    let (first, rest) = fragment.split_first()?;
    let name = first.identifier()?.to_string();
    if name.is_empty() {
        return None;
    }

    let mut type_words = Vec::new();
    for (i, token) in rest.iter().enumerate() {
        let Token::Bare(word) = token else {
            break;
        };
        let starts_charset = word.eq_ignore_ascii_case("CHARACTER")
            && rest.get(i + 1).is_some_and(|next| next.is_keyword("SET"));
        if is_column_keyword(word) || starts_charset {
            break;
        }
        type_words.push(word.to_ascii_uppercase());
    }
    if type_words.is_empty() {
        return None;
    }
    let raw_type = type_words.join(" ");

    let words: Vec<String> = rest
        .iter()
        .filter_map(Token::as_bare)
        .map(str::to_ascii_uppercase)
        .collect();
    let joined = words.join(" ");

    let is_auto_increment = raw_type.contains("SERIAL")
        || words
            .iter()
            .any(|w| AUTO_INCREMENT_MARKERS.contains(&w.as_str()) || w == "SERIAL");
    let is_primary_key = joined.contains("PRIMARY KEY");

    Some(ColumnDefinitionRaw {
        name,
        raw_type,
        nullable: !joined.contains("NOT NULL"),
        is_primary_key,
        is_auto_increment,
    })
}

fn is_column_keyword(word: &str) -> bool {
    COLUMN_KEYWORDS
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

/// Column names of a `[CONSTRAINT name] PRIMARY KEY (..)` fragment.
fn primary_key_columns(fragment: &[Token]) -> Result<Option<Vec<String>>, SplitError> {
    let Some(position) = fragment
        .windows(2)
        .position(|pair| pair[0].is_keyword("PRIMARY") && pair[1].is_keyword("KEY"))
    else {
        return Ok(None);
    };

    let Some(group) = fragment[position + 2..]
        .iter()
        .find(|token| matches!(token, Token::Group(_)))
    else {
        return Ok(None);
    };

    let names = split_on_commas(group.group_tokens()?)
        .into_iter()
        .filter_map(|segment| segment.first().and_then(Token::identifier).map(str::to_string))
        .collect();
    Ok(Some(names))
}

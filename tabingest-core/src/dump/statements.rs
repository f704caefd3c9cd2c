//! Statement scanning: comment stripping, `;` splitting and header matching.

use std::sync::OnceLock;

/// Pre-compiled statement patterns.
///
/// Uses `OnceLock` for thread-safe lazy initialization.
pub struct StatementPatterns {
    /// `CREATE TABLE [IF NOT EXISTS] name (` header
    pub create_table: regex::Regex,
    /// `INSERT [IGNORE] INTO name [(cols)] VALUES` header
    pub insert: regex::Regex,
    /// Flat parenthesized run used by the VALUES fallback
    pub value_group: regex::Regex,
}

impl StatementPatterns {
    /// Gets the singleton instance of pre-compiled statement patterns.
    pub fn instance() -> &'static Self {
        static PATTERNS: OnceLock<StatementPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    fn compile() -> Self {
        Self {
            create_table: regex::Regex::new(
                r"(?is)^\s*CREATE\s+(?:(?:GLOBAL|LOCAL)\s+)?(?:TEMP(?:ORARY)?\s+|UNLOGGED\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?P<name>[^\s(]+)\s*(?P<body>\(.*)$",
            )
            .expect("Invalid create table pattern"),
            insert: regex::Regex::new(
                r"(?is)^\s*(?:INSERT|REPLACE)\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY)\s+)?(?:IGNORE\s+)?INTO\s+(?P<name>[^\s(]+)\s*(?:\((?P<columns>[^)]*)\)\s*)?VALUES?\s*(?P<values>.*)$",
            )
            .expect("Invalid insert pattern"),
            value_group: regex::Regex::new(r"\(([^)]*)\)").expect("Invalid value group pattern"),
        }
    }
}

/// Classification of a dump statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    Insert,
    Other,
}

/// Classifies a statement by its leading keywords.
pub fn classify(statement: &str) -> StatementKind {
    let head: String = statement
        .split_whitespace()
        .take(6)
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();

    if head.starts_with("CREATE") && head.split(' ').take(5).any(|w| w == "TABLE") {
        StatementKind::CreateTable
    } else if head.starts_with("INSERT") || head.starts_with("REPLACE") {
        StatementKind::Insert
    } else {
        StatementKind::Other
    }
}

/// Removes `--` and `#` line comments and `/* */` block comments outside
/// string literals, then splits on top-level `;`.
///
/// Returned statements are trimmed and never empty.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            current.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if ch == open {
                if chars.peek() == Some(&open) {
                    current.push(open);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => skip_line(&mut chars),
            '#' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                current.push(' ');
            }
            ';' => push_statement(&mut statements, &mut current),
            _ => current.push(ch),
        }
    }

    push_statement(&mut statements, &mut current);
    statements
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for next in chars.by_ref() {
        if next == '\n' {
            break;
        }
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Normalizes a table reference: last dotted segment, quotes and brackets
/// removed.
pub fn table_name(reference: &str) -> String {
    let trimmed = reference.trim();
    let last = split_qualified(trimmed).pop().unwrap_or_default();
    last.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'))
        .to_string()
}

/// Splits `a.b.c` on dots that are not inside quotes or brackets.
fn split_qualified(reference: &str) -> Vec<String> {
    let mut segments = vec![String::new()];
    let mut closing: Option<char> = None;

    for ch in reference.chars() {
        match (closing, ch) {
            (None, '`' | '"') => closing = Some(ch),
            (None, '[') => closing = Some(']'),
            (Some(close), c) if c == close => closing = None,
            (None, '.') => {
                segments.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = segments.last_mut() {
            last.push(ch);
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_strips_comments() {
        let text = "-- header comment\n\
                    /*!40101 SET NAMES utf8 */;\n\
                    # mysql comment\n\
                    CREATE TABLE t (a INT); -- trailing\n\
                    INSERT INTO t VALUES (1);";
        let statements = split_statements(text);
        assert_eq!(
            statements,
            vec!["CREATE TABLE t (a INT)", "INSERT INTO t VALUES (1)"]
        );
    }

    #[test]
    fn test_split_respects_strings() {
        let text = "INSERT INTO t VALUES ('a;b', '-- not a comment', 'it''s; ok', 'x\\'; y');";
        let statements = split_statements(text);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("'a;b'"));
        assert!(statements[0].contains("-- not a comment"));
        assert!(statements[0].contains("'x\\'; y'"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("CREATE TABLE t (a INT)"), StatementKind::CreateTable);
        assert_eq!(
            classify("create temporary table if not exists t (a int)"),
            StatementKind::CreateTable
        );
        assert_eq!(classify("INSERT IGNORE INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(classify("LOCK TABLES `t` WRITE"), StatementKind::Other);
        assert_eq!(classify("UNLOCK TABLES"), StatementKind::Other);
        assert_eq!(classify("CREATE INDEX idx ON t (a)"), StatementKind::Other);
        assert_eq!(classify("DROP TABLE IF EXISTS t"), StatementKind::Other);
    }

    #[test]
    fn test_create_table_pattern() {
        let patterns = StatementPatterns::instance();
        let captures = patterns
            .create_table
            .captures("CREATE TABLE IF NOT EXISTS `shop`.`orders` (\n  id INT\n) ENGINE=InnoDB")
            .unwrap();
        assert_eq!(table_name(&captures["name"]), "orders");
        assert!(captures["body"].starts_with('('));
    }

    #[test]
    fn test_insert_pattern() {
        let patterns = StatementPatterns::instance();
        let captures = patterns
            .insert
            .captures("INSERT INTO \"public\".\"users\" (id, \"name\") VALUES (1, 'a'), (2, 'b')")
            .unwrap();
        assert_eq!(table_name(&captures["name"]), "users");
        assert_eq!(&captures["columns"], "id, \"name\"");
        assert_eq!(&captures["values"], "(1, 'a'), (2, 'b')");

        let captures = patterns.insert.captures("insert into t values(1)").unwrap();
        assert!(captures.name("columns").is_none());
        assert_eq!(&captures["values"], "(1)");
    }

    #[test]
    fn test_table_name_normalization() {
        assert_eq!(table_name("`users`"), "users");
        assert_eq!(table_name("[dbo].[Users]"), "Users");
        assert_eq!(table_name("public.users"), "users");
        assert_eq!(table_name("\"my.table\""), "my.table");
    }
}

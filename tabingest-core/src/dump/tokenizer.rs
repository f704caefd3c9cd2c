//! Character scanner for dump statement fragments.
//!
//! Produces a flat token stream where parenthesized runs are kept as raw
//! [`Token::Group`] text, so each nesting level is split on demand.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::IngestError;

/// Lexical unit of a statement fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// String or quoted identifier content with escapes collapsed
    Quoted(String),
    /// Raw inner text of a balanced parenthesized run
    Group(String),
    /// Unquoted word (keyword, number, identifier, operator run)
    Bare(String),
    /// Top-level comma
    Comma,
}

/// Tokenization failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitError {
    pub message: String,
    pub offset: usize,
}

impl SplitError {
    fn new(message: &str, offset: usize) -> Self {
        Self {
            message: message.to_string(),
            offset,
        }
    }
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for SplitError {}

impl From<SplitError> for IngestError {
    fn from(error: SplitError) -> Self {
        IngestError::malformed(error.to_string())
    }
}

impl Token {
    /// Splits a group's inner text into tokens. Non-group tokens have none.
    pub fn group_tokens(&self) -> Result<Vec<Token>, SplitError> {
        match self {
            Token::Group(inner) => split(inner),
            _ => Ok(Vec::new()),
        }
    }

    /// Unquoted word, if this is one.
    pub fn as_bare(&self) -> Option<&str> {
        match self {
            Token::Bare(word) => Some(word),
            _ => None,
        }
    }

    /// Case-insensitive keyword test on a bare token.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.as_bare()
            .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
    }

    /// Identifier text of a bare or quoted token.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Bare(word) | Token::Quoted(word) => Some(word),
            _ => None,
        }
    }

    /// Renders the token back to SQL text.
    pub fn render(&self) -> String {
        match self {
            Token::Quoted(content) => format!("'{}'", content.replace('\'', "''")),
            Token::Group(inner) => format!("({})", inner),
            Token::Bare(word) => word.clone(),
            Token::Comma => ",".to_string(),
        }
    }
}

/// Renders a token run as text, keeping `name(...)` calls tight.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut rendered = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let tight = matches!(token, Token::Group(_) | Token::Comma)
            && matches!(tokens.get(i.wrapping_sub(1)), Some(Token::Bare(_)));
        if i > 0 && !tight {
            rendered.push(' ');
        }
        rendered.push_str(&token.render());
    }
    rendered
}

/// Splits a token stream on top-level commas.
///
/// Empty segments (leading, trailing or doubled commas) are kept so callers
/// can count positions.
pub fn split_on_commas(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut segments = vec![Vec::new()];
    for token in tokens {
        match token {
            Token::Comma => segments.push(Vec::new()),
            other => {
                if let Some(last) = segments.last_mut() {
                    last.push(other);
                }
            }
        }
    }
    segments
}

/// Tokenizes a statement fragment.
///
/// # Errors
/// Returns a [`SplitError`] for unterminated strings or unbalanced
/// parentheses.
///
/// # Example
/// ```rust
/// use tabingest_core::dump::tokenizer::{split, Token};
///
/// let tokens = split("(1, 'it''s'), (2, NULL)").unwrap();
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[1], Token::Comma);
/// ```
pub fn split(text: &str) -> Result<Vec<Token>, SplitError> {
    let mut scanner = Scanner::new(text);
    let mut tokens = Vec::new();
    let mut bare = String::new();

    while let Some((offset, ch)) = scanner.chars.next() {
        match ch {
            c if c.is_whitespace() => flush_bare(&mut bare, &mut tokens),
            ',' => {
                flush_bare(&mut bare, &mut tokens);
                tokens.push(Token::Comma);
            }
            '\'' | '"' | '`' => {
                flush_bare(&mut bare, &mut tokens);
                let content = scanner.read_quoted(ch, offset)?;
                tokens.push(Token::Quoted(content));
            }
            '(' => {
                flush_bare(&mut bare, &mut tokens);
                let inner = scanner.read_group(offset)?;
                tokens.push(Token::Group(inner.to_string()));
            }
            ')' => return Err(SplitError::new("unbalanced closing parenthesis", offset)),
            _ => bare.push(ch),
        }
    }

    flush_bare(&mut bare, &mut tokens);
    Ok(tokens)
}

fn flush_bare(bare: &mut String, tokens: &mut Vec<Token>) {
    if !bare.is_empty() {
        tokens.push(Token::Bare(std::mem::take(bare)));
    }
}

struct Scanner<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    /// Reads up to the matching unescaped quote; the opening quote is consumed.
    fn read_quoted(&mut self, quote: char, open_offset: usize) -> Result<String, SplitError> {
        let mut content = String::new();

        while let Some((_, ch)) = self.chars.next() {
            if ch == '\\' {
                let Some((_, escaped)) = self.chars.next() else {
                    break;
                };
                content.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    other => other,
                });
            } else if ch == quote {
                if self.chars.peek().is_some_and(|&(_, next)| next == quote) {
                    self.chars.next();
                    content.push(quote);
                } else {
                    return Ok(content);
                }
            } else {
                content.push(ch);
            }
        }

        Err(SplitError::new("unterminated quoted string", open_offset))
    }

    /// Returns the raw text between a consumed `(` and its matching `)`.
    fn read_group(&mut self, open_offset: usize) -> Result<&'a str, SplitError> {
        let start = open_offset + 1;
        let mut depth = 1usize;

        while let Some((offset, ch)) = self.chars.next() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&self.text[start..offset]);
                    }
                }
                '\'' | '"' | '`' => {
                    self.read_quoted(ch, offset)?;
                }
                _ => {}
            }
        }

        Err(SplitError::new("unbalanced opening parenthesis", open_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(word: &str) -> Token {
        Token::Bare(word.to_string())
    }

    fn quoted(content: &str) -> Token {
        Token::Quoted(content.to_string())
    }

    #[test]
    fn test_bare_words_and_commas() {
        let tokens = split("a INT ,b  TEXT").unwrap();
        assert_eq!(
            tokens,
            vec![bare("a"), bare("INT"), Token::Comma, bare("b"), bare("TEXT")]
        );
    }

    #[test]
    fn test_doubled_quote_is_literal() {
        assert_eq!(split("'it''s'").unwrap(), vec![quoted("it's")]);
        assert_eq!(split(r#""say ""hi""""#).unwrap(), vec![quoted(r#"say "hi""#)]);
    }

    #[test]
    fn test_backslash_escapes_collapse() {
        let tokens = split(r"'a\'b\\c\nd\te\0'").unwrap();
        assert_eq!(tokens, vec![quoted("a'b\\c\nd\te\0")]);
    }

    #[test]
    fn test_backtick_identifiers() {
        let tokens = split("`user id` VARCHAR(10)").unwrap();
        assert_eq!(
            tokens,
            vec![quoted("user id"), bare("VARCHAR"), Token::Group("10".to_string())]
        );
    }

    #[test]
    fn test_group_keeps_raw_inner_text() {
        let tokens = split("(1, 'a)b', (2)) , (3)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Group("1, 'a)b', (2)".to_string()),
                Token::Comma,
                Token::Group("3".to_string()),
            ]
        );

        let inner = tokens[0].group_tokens().unwrap();
        assert_eq!(
            inner,
            vec![
                bare("1"),
                Token::Comma,
                quoted("a)b"),
                Token::Comma,
                Token::Group("2".to_string()),
            ]
        );
    }

    #[test]
    fn test_parens_inside_strings_ignored() {
        let tokens = split("('(((')").unwrap();
        assert_eq!(tokens, vec![Token::Group("'((('".to_string())]);
    }

    #[test]
    fn test_unterminated_string() {
        let error = split("(1, 'abc)").unwrap_err();
        assert!(error.message.contains("unterminated"));
        assert_eq!(error.offset, 4);
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(split("(1, 2").unwrap_err().message.contains("opening"));
        assert!(split("1, 2)").unwrap_err().message.contains("closing"));
    }

    #[test]
    fn test_split_error_converts_to_malformed_fragment() {
        let error: IngestError = split("'abc").unwrap_err().into();
        assert!(matches!(error, IngestError::MalformedFragment { .. }));
    }

    #[test]
    fn test_render_tokens() {
        let tokens = split("NOW()").unwrap();
        assert_eq!(render_tokens(&tokens), "NOW()");

        let tokens = split("CONCAT('a', 'b')").unwrap();
        assert_eq!(render_tokens(&tokens), "CONCAT('a', 'b')");

        let tokens = split("x + 1").unwrap();
        assert_eq!(render_tokens(&tokens), "x + 1");
    }

    #[test]
    fn test_split_on_commas_keeps_empty_segments() {
        let segments = split_on_commas(split("a,,b").unwrap());
        assert_eq!(segments, vec![vec![bare("a")], vec![], vec![bare("b")]]);
    }

    #[test]
    fn test_prefixed_literal_splits_into_bare_and_quoted() {
        let tokens = split("N'abc' _utf8mb4'x'").unwrap();
        assert_eq!(
            tokens,
            vec![bare("N"), quoted("abc"), bare("_utf8mb4"), quoted("x")]
        );
    }
}

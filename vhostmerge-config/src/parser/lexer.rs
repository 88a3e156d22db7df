//! Lexer for `location` declaration lines
//!
//! Only the structure of a declaration matters here:
//! - `location` keyword
//! - selector words (operator and pattern)
//! - `{` / `}`
//! - `##merge##` / `##delete##` annotations
//!
//! Everything else is an opaque word. Braces are always structural, even
//! inside quoted selector text.

use logos::{Logos, Span};

/// Source location within a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// A token with its location in the line
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Location,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: impl Into<Location>) -> Self {
        Self {
            value,
            span: span.into(),
        }
    }
}

/// Token types for a declaration line
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("location")]
    Location,

    #[token("{")]
    BlockOpen,

    #[token("}")]
    BlockClose,

    #[token("##merge##")]
    MergeMarker,

    #[token("##delete##")]
    DeleteMarker,

    /// Anything that isn't whitespace or a brace
    #[regex(r"[^ \t\r\n\f{}]+", |lex| lex.slice().to_string())]
    Word(String),
}

impl Token {
    /// Whether this token is a merge/delete annotation
    pub fn is_marker(&self) -> bool {
        matches!(self, Token::MergeMarker | Token::DeleteMarker)
    }
}

/// Lexer error
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character at position {position}")]
    UnexpectedChar { position: usize },
}

/// Tokenize one line of vhost text
pub fn tokenize(line: &str) -> Result<Vec<Spanned<Token>>, LexError> {
    let mut tokens = Vec::new();

    for (result, span) in Token::lexer(line).spanned() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(_) => return Err(LexError::UnexpectedChar { position: span.start }),
        }
    }

    Ok(tokens)
}

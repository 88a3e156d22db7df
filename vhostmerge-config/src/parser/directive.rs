//! Directive grammar validation
//!
//! User-supplied rewrite and proxy directives are accepted only when every
//! line matches one of a small set of permitted forms and `if` blocks are
//! balanced. A batch is all-or-nothing: one bad line rejects everything.

use crate::parser::normalize::normalize_line_breaks;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Flags accepted after a rewrite target
const REWRITE_FLAGS: &str = "last|break|redirect|permanent";

/// Unquoted token or a run of single/double-quoted strings
const ARG: &str = r#"(?:(?:'[^']+'|"[^"]+")+|\S+)"#;

static REWRITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*rewrite\s+{ARG}\s+{ARG}(?:\s+(?:{REWRITE_FLAGS}))?\s*;\s*$"
    ))
    .expect("rewrite pattern is valid")
});

static IF_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*if\s+\(\s*\$\S+(?:\s+!?(?:=|~\*|~)\s+(?:"[^"]+"|'[^']+'|\S+))?\s*\)\s*\{\s*$"#)
        .expect("if pattern is valid")
});

static IF_FILE_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*if\s+\(\s*!?-[fdex]\s+\S+\s*\)\s*\{\s*$").expect("file test pattern is valid")
});

static BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*break\s*;\s*$").expect("break pattern is valid"));

static RETURN_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*return\s+\d{3}.*;\s*$").expect("return pattern is valid"));

static RETURN_URL: LazyLock<Regex> = LazyLock::new(|| {
    let octet_lead = r"(?:25[0-5]|2[0-4][0-9]|[0-1][0-9]{2}|[1-9][0-9]|[1-9])";
    let octet = r"(?:25[0-5]|2[0-4][0-9]|[0-1][0-9]{2}|[1-9][0-9]|[0-9])";
    let tld = r"(?:com|edu|gov|int|mil|net|org|biz|arpa|info|name|pro|aero|coop|museum|[a-zA-Z]{2})";
    let host = format!(
        r"(?:{octet_lead}\.{octet}\.{octet}\.{octet}|localhost|(?:[a-zA-Z0-9\-]+\.)*[a-zA-Z0-9\-]+\.{tld})"
    );
    let userinfo = r"(?:[a-zA-Z0-9.\-]+(?::[a-zA-Z0-9.&%$\-]+)*@)*";
    let path = r"(?:/(?:$|[a-zA-Z0-9.,?'\\+&%$#=~_\-]+))*";
    Regex::new(&format!(
        r"^\s*return(?:\s+\d{{3}})?\s+(?:http|https|ftp)://{userinfo}{host}(?::[0-9]+)*{path}\s*;\s*$"
    ))
    .expect("return url pattern is valid")
});

static SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*set\s+\$\S+\s+\S+\s*;\s*$").expect("set pattern is valid"));

/// Classification of a single directive line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Blank,
    Comment,
    Rewrite,
    /// `if (...) {`
    ConditionalOpen,
    /// Lone `}`
    ConditionalClose,
    Break,
    Return,
    Set,
    Invalid,
}

impl DirectiveKind {
    /// Nesting depth change contributed by a line of this kind
    pub fn depth_delta(self) -> i32 {
        match self {
            DirectiveKind::ConditionalOpen => 1,
            DirectiveKind::ConditionalClose => -1,
            _ => 0,
        }
    }

    pub fn is_valid(self) -> bool {
        self != DirectiveKind::Invalid
    }
}

/// Classify one line, first matching rule wins
pub fn classify(line: &str) -> DirectiveKind {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        DirectiveKind::Blank
    } else if trimmed.starts_with('#') {
        DirectiveKind::Comment
    } else if REWRITE.is_match(line) {
        DirectiveKind::Rewrite
    } else if IF_VARIABLE.is_match(line) || IF_FILE_TEST.is_match(line) {
        DirectiveKind::ConditionalOpen
    } else if BREAK.is_match(line) {
        DirectiveKind::Break
    } else if RETURN_CODE.is_match(line) || RETURN_URL.is_match(line) {
        DirectiveKind::Return
    } else if SET.is_match(line) {
        DirectiveKind::Set
    } else if trimmed == "}" {
        DirectiveKind::ConditionalClose
    } else {
        DirectiveKind::Invalid
    }
}

/// One classified line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveLine {
    text: String,
    kind: DirectiveKind,
}

impl DirectiveLine {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Self { text, kind }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> DirectiveKind {
        self.kind
    }

    pub fn depth_delta(&self) -> i32 {
        self.kind.depth_delta()
    }
}

/// Reasons a directive batch is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("Line {line} is not a permitted directive: {text}")]
    InvalidLine { line: usize, text: String },

    #[error("Line {line} closes a block that was never opened")]
    NegativeDepth { line: usize },

    #[error("{depth} block(s) left open at end of input")]
    UnbalancedNesting { depth: i32 },
}

impl DirectiveError {
    /// 1-based line the error points at, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            DirectiveError::InvalidLine { line, .. } | DirectiveError::NegativeDepth { line } => {
                Some(*line)
            }
            DirectiveError::UnbalancedNesting { .. } => None,
        }
    }
}

/// An accepted, balanced sequence of directive lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveBatch {
    lines: Vec<DirectiveLine>,
}

impl DirectiveBatch {
    /// Validate raw multi-line directive text.
    ///
    /// Line breaks are normalized to `\n`, trailing whitespace and leading
    /// blank lines are dropped. Indentation of every kept line is preserved
    /// and error line numbers count from the first line of `raw`.
    /// Whitespace-only input yields an empty batch.
    pub fn parse(raw: &str) -> Result<Self, DirectiveError> {
        let text = normalize_line_breaks(raw);
        let lines: Vec<&str> = text.trim_end().split('\n').collect();
        let skip = lines.iter().take_while(|line| line.trim().is_empty()).count();
        Self::validate(lines[skip..].iter().copied(), skip)
    }

    /// Validate an ordered sequence of already-split lines
    pub fn from_lines<I, S>(lines: I) -> Result<Self, DirectiveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::validate(lines, 0)
    }

    /// `offset` is the number of lines dropped ahead of `lines`
    fn validate<I, S>(lines: I, offset: usize) -> Result<Self, DirectiveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut accepted = Vec::new();
        let mut depth = 0i32;

        for (idx, raw) in lines.into_iter().enumerate() {
            let number = offset + idx + 1;
            let line = DirectiveLine::new(raw);
            if !line.kind().is_valid() {
                return Err(DirectiveError::InvalidLine {
                    line: number,
                    text: line.text,
                });
            }

            depth += line.depth_delta();
            if depth < 0 {
                return Err(DirectiveError::NegativeDepth { line: number });
            }
            accepted.push(line);
        }

        if depth != 0 {
            return Err(DirectiveError::UnbalancedNesting { depth });
        }

        Ok(Self { lines: accepted })
    }

    pub fn lines(&self) -> &[DirectiveLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Raw text of every line, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(DirectiveLine::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rewrite_forms() {
        assert_eq!(classify("rewrite ^/a /b;"), DirectiveKind::Rewrite);
        assert_eq!(classify("  rewrite ^/old/(.*)$ /new/$1 permanent;"), DirectiveKind::Rewrite);
        assert_eq!(classify(r#"rewrite "^/a b" '/c d' last;"#), DirectiveKind::Rewrite);
        assert_eq!(classify(r#"rewrite "^/a" /b break;"#), DirectiveKind::Rewrite);
        assert_eq!(classify("rewrite ^/a /b c;"), DirectiveKind::Invalid);
        assert_eq!(classify("rewrite ^/a;"), DirectiveKind::Invalid);
        assert_eq!(classify("rewrite ^/a /b"), DirectiveKind::Invalid);
    }

    #[test]
    fn test_classify_conditionals() {
        assert_eq!(classify("if ($request_method = POST) {"), DirectiveKind::ConditionalOpen);
        assert_eq!(classify("if ($http_host != example.com) {"), DirectiveKind::ConditionalOpen);
        assert_eq!(classify(r#"if ($http_user_agent ~* "bad bot") {"#), DirectiveKind::ConditionalOpen);
        assert_eq!(classify("if ($slow) {"), DirectiveKind::ConditionalOpen);
        assert_eq!(classify("if (!-f $request_filename) {"), DirectiveKind::ConditionalOpen);
        assert_eq!(classify("if (-d $request_filename) {"), DirectiveKind::ConditionalOpen);
        assert_eq!(classify("if (-z $x) {"), DirectiveKind::Invalid);
        assert_eq!(classify("if ($a = b)"), DirectiveKind::Invalid);
        assert_eq!(classify("  }  "), DirectiveKind::ConditionalClose);
    }

    #[test]
    fn test_classify_misc() {
        assert_eq!(classify(""), DirectiveKind::Blank);
        assert_eq!(classify("   \t"), DirectiveKind::Blank);
        assert_eq!(classify("  # anything; goes { here"), DirectiveKind::Comment);
        assert_eq!(classify("break;"), DirectiveKind::Break);
        assert_eq!(classify("break ;  "), DirectiveKind::Break);
        assert_eq!(classify("set $flag 1;"), DirectiveKind::Set);
        assert_eq!(classify("set flag 1;"), DirectiveKind::Invalid);
        assert_eq!(classify("proxy_pass http://backend;"), DirectiveKind::Invalid);
    }

    #[test]
    fn test_classify_return() {
        assert_eq!(classify("return 404;"), DirectiveKind::Return);
        assert_eq!(classify("return 403 \"forbidden\";"), DirectiveKind::Return);
        assert_eq!(classify("return 301 https://www.example.com/path;"), DirectiveKind::Return);
        assert_eq!(classify("return https://example.org;"), DirectiveKind::Return);
        assert_eq!(classify("return http://10.0.0.1:8080/app;"), DirectiveKind::Return);
        assert_eq!(classify("return http://localhost:3000/app;"), DirectiveKind::Return);
        assert_eq!(classify("return http://localhost/;"), DirectiveKind::Invalid);
        assert_eq!(classify("return gopher://example.com;"), DirectiveKind::Invalid);
        assert_eq!(classify("return https://example.com/a b;"), DirectiveKind::Invalid);
        assert_eq!(classify("return 40;"), DirectiveKind::Invalid);
    }

    #[test]
    fn test_batch_accepts_balanced_blocks() {
        let batch = DirectiveBatch::parse(
            "if (!-e $request_filename) {\r\n    rewrite ^/(.*)$ /index.php?q=$1 last;\r\n}\r\n# done",
        )
        .unwrap();
        assert_eq!(batch.len(), 4);
        let deltas: Vec<i32> = batch.lines().iter().map(DirectiveLine::depth_delta).collect();
        assert_eq!(deltas, vec![1, 0, -1, 0]);
    }

    #[test]
    fn test_batch_rejects_whole_input_on_bad_line() {
        let err = DirectiveBatch::from_lines([" rewrite ^/a /b;", "garbage"]).unwrap_err();
        assert_eq!(
            err,
            DirectiveError::InvalidLine { line: 2, text: "garbage".to_string() }
        );
    }

    #[test]
    fn test_batch_rejects_unbalanced() {
        let err = DirectiveBatch::parse("if ($a) {\nbreak;").unwrap_err();
        assert_eq!(err, DirectiveError::UnbalancedNesting { depth: 1 });
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_batch_rejects_negative_prefix() {
        // Final depth is zero, but the first line goes below it
        let err = DirectiveBatch::from_lines(["}", "if ($a) {"]).unwrap_err();
        assert_eq!(err, DirectiveError::NegativeDepth { line: 1 });
    }

    #[test]
    fn test_parse_keeps_indentation_and_line_numbers() {
        let batch = DirectiveBatch::parse("\n\n  if ($a) {\n    return 403;\n  }\n\n").unwrap();
        let texts: Vec<&str> = batch.texts().collect();
        assert_eq!(texts, vec!["  if ($a) {", "    return 403;", "  }"]);

        let err = DirectiveBatch::parse("\r\n\r\nbreak;\r\ngarbage").unwrap_err();
        assert_eq!(err, DirectiveError::InvalidLine { line: 4, text: "garbage".to_string() });
    }

    #[test]
    fn test_empty_input() {
        assert!(DirectiveBatch::parse("  \n\r\n ").unwrap().is_empty());
    }
}

//! Top-level `location` block extraction
//!
//! Scans normalized vhost text line by line with a two-state machine
//! (outside a block / inside one at some brace depth). Every complete
//! declaration is returned with its selector, annotation, body lines and the
//! index of its opening line; all other lines come back as residual text.

use crate::parser::lexer::{tokenize, Token};
use std::fmt;

/// What a declaration does to earlier declarations of the same selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Annotation {
    /// Discard earlier bodies
    #[default]
    Replace,
    /// Append to earlier bodies
    Merge,
    /// Drop the selector from the output
    Delete,
}

impl Annotation {
    /// Combine two markers seen on one declaration, delete wins over merge
    fn strongest(self, other: Annotation) -> Annotation {
        match (self, other) {
            (Annotation::Delete, _) | (_, Annotation::Delete) => Annotation::Delete,
            (Annotation::Merge, _) | (_, Annotation::Merge) => Annotation::Merge,
            _ => Annotation::Replace,
        }
    }

    fn from_token(token: &Token) -> Option<Annotation> {
        match token {
            Token::MergeMarker => Some(Annotation::Merge),
            Token::DeleteMarker => Some(Annotation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Replace => write!(f, "replace"),
            Annotation::Merge => write!(f, "merge"),
            Annotation::Delete => write!(f, "delete"),
        }
    }
}

/// One complete `location` declaration as written in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDeclaration {
    /// Operator and pattern joined by single spaces, e.g. `~* \.php$`
    pub selector: String,
    pub annotation: Annotation,
    /// Body lines, verbatim, without the opening and closing lines
    pub body: Vec<String>,
    /// Index of the opening line
    pub line: usize,
}

/// A line outside every top-level block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualLine {
    pub line: usize,
    pub text: String,
}

/// Result of scanning one vhost text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationScan {
    pub declarations: Vec<LocationDeclaration>,
    pub residual: Vec<ResidualLine>,
    /// Line of the second `server {` container, if extraction stopped there
    pub overrun_at: Option<usize>,
    /// Declarations whose block never closed; their lines stay residual
    pub unterminated: Vec<LocationDeclaration>,
}

/// Parse an opening line: `location [op] pattern { [marker]...`
///
/// Returns the selector and annotation, or `None` for anything that is not
/// a clean multi-line declaration.
pub fn parse_declaration(line: &str) -> Option<(String, Annotation)> {
    let tokens = tokenize(line).ok()?;
    let mut iter = tokens.iter().map(|t| &t.value);

    if iter.next() != Some(&Token::Location) {
        return None;
    }

    let mut words = Vec::new();
    let mut annotation = Annotation::Replace;
    let mut opened = false;

    for token in iter {
        match token {
            Token::Word(word) if !opened => words.push(word.as_str()),
            Token::BlockOpen if !opened => opened = true,
            other => match Annotation::from_token(other) {
                Some(marker) => annotation = annotation.strongest(marker),
                None => return None,
            },
        }
    }

    if !opened || words.is_empty() {
        return None;
    }
    Some((words.join(" "), annotation))
}

/// Annotation written after the `}` of a closing line
fn trailing_annotation(line: &str, close: usize) -> Annotation {
    tokenize(&line[close + 1..])
        .map(|tokens| {
            tokens
                .iter()
                .filter_map(|t| Annotation::from_token(&t.value))
                .fold(Annotation::Replace, Annotation::strongest)
        })
        .unwrap_or_default()
}

struct OpenBlock {
    declaration: LocationDeclaration,
    depth: usize,
    /// Every line taken by this block so far, for rollback
    consumed: Vec<ResidualLine>,
}

enum ScanState {
    Outside,
    InBlock(OpenBlock),
}

/// Block parser
pub struct LocationParser {
    state: ScanState,
    scan: LocationScan,
    servers_seen: usize,
}

impl LocationParser {
    pub fn new() -> Self {
        Self {
            state: ScanState::Outside,
            scan: LocationScan::default(),
            servers_seen: 0,
        }
    }

    /// Scan the whole text
    pub fn parse(mut self, text: &str) -> LocationScan {
        let lines: Vec<&str> = text.split('\n').collect();

        for (idx, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with("server {") {
                self.servers_seen += 1;
                if self.servers_seen > 1 {
                    tracing::warn!("⚠️ Second server container at line {}, stopping location extraction", idx + 1);
                    self.scan.overrun_at = Some(idx);
                    self.abandon_open_block();
                    self.scan.residual.extend(lines[idx..].iter().enumerate().map(|(off, text)| {
                        ResidualLine { line: idx + off, text: text.to_string() }
                    }));
                    return self.scan;
                }
            }
            self.feed(idx, line);
        }

        self.abandon_open_block();
        self.scan
    }

    fn feed(&mut self, idx: usize, line: &str) {
        let state = std::mem::replace(&mut self.state, ScanState::Outside);

        self.state = match state {
            ScanState::Outside => match parse_declaration(line) {
                Some((selector, annotation)) => {
                    tracing::trace!("Location `{}` ({}) opens at line {}", selector, annotation, idx + 1);
                    ScanState::InBlock(OpenBlock {
                        declaration: LocationDeclaration {
                            selector,
                            annotation,
                            body: Vec::new(),
                            line: idx,
                        },
                        depth: 0,
                        consumed: vec![ResidualLine { line: idx, text: line.to_string() }],
                    })
                }
                None => {
                    self.scan.residual.push(ResidualLine { line: idx, text: line.to_string() });
                    ScanState::Outside
                }
            },
            ScanState::InBlock(mut block) => {
                block.consumed.push(ResidualLine { line: idx, text: line.to_string() });

                // Only the last brace of each kind on a line counts
                let open = line.rfind('{');
                let close = line.rfind('}');
                if open.is_some() {
                    block.depth += 1;
                }

                match close {
                    Some(close) if close >= open.unwrap_or(0) => {
                        if block.depth > 0 {
                            block.depth -= 1;
                            block.declaration.body.push(line.to_string());
                            ScanState::InBlock(block)
                        } else {
                            let mut declaration = block.declaration;
                            declaration.annotation = declaration
                                .annotation
                                .strongest(trailing_annotation(line, close));
                            self.scan.declarations.push(declaration);
                            ScanState::Outside
                        }
                    }
                    _ => {
                        block.declaration.body.push(line.to_string());
                        ScanState::InBlock(block)
                    }
                }
            }
        };
    }

    /// Return the lines of a block that never closed to the residual text
    fn abandon_open_block(&mut self) {
        if let ScanState::InBlock(block) = std::mem::replace(&mut self.state, ScanState::Outside) {
            tracing::warn!(
                "⚠️ Location `{}` opened at line {} is never closed, leaving it untouched",
                block.declaration.selector,
                block.declaration.line + 1
            );
            self.scan.residual.extend(block.consumed);
            self.scan.unterminated.push(block.declaration);
        }
    }
}

impl Default for LocationParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan normalized text for top-level location blocks
pub fn parse_locations(text: &str) -> LocationScan {
    LocationParser::new().parse(text)
}

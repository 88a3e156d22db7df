//! Text normalization ahead of block parsing
//!
//! A `location` block written on one physical line is expanded onto three
//! lines (open, body, close) so the brace tracking in the block parser only
//! has to deal with one layout. Merge/delete markers always end up on the
//! opening line.

use crate::parser::lexer::{tokenize, Spanned, Token};

const MERGE_MARKER: &str = "##merge##";
const DELETE_MARKER: &str = "##delete##";

/// Convert `\r\n` and lone `\r` to `\n`
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Normalize rendered vhost text.
///
/// Trailing whitespace is trimmed from every line, whole-line comments are
/// dropped when `strip_comments` is set, and single-line `location` blocks
/// are expanded.
pub fn normalize_vhost(text: &str, strip_comments: bool) -> String {
    let text = normalize_line_breaks(text);
    let mut out = Vec::new();

    for line in text.split('\n') {
        if strip_comments && line.trim_start().starts_with('#') {
            continue;
        }

        let line = line.trim_end();
        match expand_declaration(line) {
            Some(expanded) => {
                tracing::trace!("Expanded location declaration: {}", line.trim());
                out.extend(expanded);
            }
            None => out.push(line.to_string()),
        }
    }

    out.join("\n")
}

/// Expand a `location` line that carries content after its opening brace.
///
/// A body that is itself a one-line `location` block is expanded too, so a
/// second pass over the output finds nothing left to expand.
///
/// Returns `None` when the line is not a declaration, is already in the
/// multi-line form, or cannot be expanded safely (for example two blocks on
/// one line). Such lines are left untouched.
pub fn expand_declaration(line: &str) -> Option<Vec<String>> {
    let tokens = tokenize(line).ok()?;
    if !matches!(tokens.first().map(|t| &t.value), Some(Token::Location)) {
        return None;
    }

    let open = tokens.iter().position(|t| t.value == Token::BlockOpen)?;
    let mut selector = Vec::new();
    let mut merge = false;
    let mut delete = false;

    for token in &tokens[1..open] {
        match &token.value {
            Token::Word(word) => selector.push(word.as_str()),
            Token::MergeMarker => merge = true,
            Token::DeleteMarker => delete = true,
            _ => return None,
        }
    }
    if selector.is_empty() {
        return None;
    }

    let close = find_matching_close(&tokens, open);
    let (body_end, trailing) = match close {
        Some(close) => (tokens[close].span.start, &tokens[close + 1..]),
        None => (line.len(), &tokens[tokens.len()..]),
    };

    // After the closing brace only annotations may follow
    for token in trailing {
        match token.value {
            Token::MergeMarker => merge = true,
            Token::DeleteMarker => delete = true,
            _ => return None,
        }
    }

    let inner_tokens = match close {
        Some(close) => &tokens[open + 1..close],
        None => &tokens[open + 1..],
    };
    for token in inner_tokens.iter().filter(|t| t.value.is_marker()) {
        match token.value {
            Token::MergeMarker => merge = true,
            _ => delete = true,
        }
    }

    let body = strip_markers(&line[tokens[open].span.end..body_end]);
    let body = body.trim_end();

    // Already in canonical multi-line form
    if close.is_none() && body.trim().is_empty() {
        return None;
    }

    let indent = &line[..line.len() - line.trim_start().len()];
    let mut opening = format!("{}location {} {{", indent, selector.join(" "));
    if delete {
        opening.push(' ');
        opening.push_str(DELETE_MARKER);
    } else if merge {
        opening.push(' ');
        opening.push_str(MERGE_MARKER);
    }

    let mut lines = vec![opening];
    if !body.trim().is_empty() {
        match expand_declaration(body) {
            Some(inner) => lines.extend(inner),
            None => lines.push(body.to_string()),
        }
    }
    if close.is_some() {
        lines.push(format!("{}}}", indent));
    }
    Some(lines)
}

/// Index of the `}` that closes the brace at `open`
fn find_matching_close(tokens: &[Spanned<Token>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.value {
            Token::BlockOpen => depth += 1,
            Token::BlockClose => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_markers(text: &str) -> String {
    let mut out = text.to_string();
    for marker in [MERGE_MARKER, DELETE_MARKER] {
        out = out.replace(&format!("{} ", marker), "").replace(marker, "");
    }
    out
}

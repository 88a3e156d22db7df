//! Human-readable reports for rejected directive batches

use crate::parser::directive::DirectiveError;
use crate::parser::normalize::normalize_line_breaks;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::ops::Range;

/// Render a rejection against the text it came from.
///
/// `raw` must be the exact text given to `DirectiveBatch::parse`, since line
/// numbers in the error count its lines.
pub fn render_rejection(source_name: &str, raw: &str, error: &DirectiveError) -> String {
    let normalized = normalize_line_breaks(raw);
    let text = normalized.trim_end();
    let line_count = text.split('\n').count();
    let line = error.line().unwrap_or(line_count);
    let span = line_span(text, line);

    let label = match error {
        DirectiveError::InvalidLine { .. } => "not a permitted directive",
        DirectiveError::NegativeDepth { .. } => "no open block to close here",
        DirectiveError::UnbalancedNesting { .. } => "input ends with open blocks",
    };

    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, (source_name, span.clone()))
        .with_config(Config::default().with_color(false))
        .with_message(error.to_string())
        .with_label(Label::new((source_name, span)).with_message(label))
        .with_note("the whole batch is ignored; fix or remove this line")
        .finish()
        .write((source_name, Source::from(text)), &mut out);

    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(e) => {
            tracing::debug!("Failed to render report: {}", e);
            format!("{}: {}", source_name, error)
        }
    }
}

/// Character range of a 1-based line
fn line_span(text: &str, line: usize) -> Range<usize> {
    let mut start = 0;
    for (idx, content) in text.split('\n').enumerate() {
        let len = content.chars().count();
        if idx + 1 == line {
            return start..start + len;
        }
        start += len + 1;
    }
    start..start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::directive::DirectiveBatch;

    #[test]
    fn test_line_span() {
        assert_eq!(line_span("ab\ncde\nf", 2), 3..6);
        assert_eq!(line_span("ab\ncde\nf", 3), 7..8);
    }

    #[test]
    fn test_render_invalid_line() {
        let raw = "rewrite ^/a /b;\nproxy_pass http://evil;\n";
        let err = DirectiveBatch::parse(raw).unwrap_err();
        let report = render_rejection("rules.conf", raw, &err);

        assert!(report.contains("Line 2 is not a permitted directive"));
        assert!(report.contains("proxy_pass http://evil;"));
        assert!(report.contains("rules.conf"));
    }

    #[test]
    fn test_render_after_leading_blank_lines() {
        let raw = "\n\nbreak;\nproxy_pass http://evil;";
        let err = DirectiveBatch::parse(raw).unwrap_err();
        assert_eq!(err.line(), Some(4));
        let report = render_rejection("rules.conf", raw, &err);
        assert!(report.contains("proxy_pass http://evil;"));
    }

    #[test]
    fn test_render_unbalanced() {
        let raw = "if ($a) {\n  return 403;";
        let err = DirectiveBatch::parse(raw).unwrap_err();
        let report = render_rejection("rules.conf", raw, &err);
        assert!(report.contains("left open"));
    }
}

//! `##subroot <path> ##` token expansion
//!
//! The payload of the first token is appended to the value of the first
//! `root` directive. Payloads outside a strict path grammar are refused and
//! the text is left exactly as rendered.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use thiserror::Error;

static SUBROOT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##subroot (.+?)\s*##").expect("subroot pattern is valid"));

static ROOT_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*root[ \t]+[^;\n]*;").expect("root pattern is valid"));

/// Subroot expansion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubrootError {
    #[error("Token ##subroot is unsecure: {payload:?}")]
    UnsafePayload { payload: String },

    #[error("Token ##subroot found but there is no root directive to extend")]
    MissingRoot,
}

/// Letters, digits, `/`, `_`, `.` and `-`, with no `..` and no `//`
pub fn is_safe_subroot(payload: &str) -> bool {
    !payload.is_empty()
        && payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'))
        && !payload.contains("..")
        && !payload.contains("//")
}

/// Payload of the first subroot token, if any
pub fn find_subroot(text: &str) -> Option<&str> {
    SUBROOT_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splice the subroot payload into the first `root` directive.
///
/// Text without a token is returned borrowed and unchanged.
pub fn expand_subroot(text: &str) -> Result<Cow<'_, str>, SubrootError> {
    let Some(payload) = find_subroot(text) else {
        return Ok(Cow::Borrowed(text));
    };

    if !is_safe_subroot(payload) {
        return Err(SubrootError::UnsafePayload {
            payload: payload.to_string(),
        });
    }

    let root = ROOT_DIRECTIVE.find(text).ok_or(SubrootError::MissingRoot)?;
    // Insert right before the terminating `;`
    let insert_at = root.end() - 1;

    let mut out = String::with_capacity(text.len() + payload.len());
    out.push_str(&text[..insert_at]);
    out.push_str(payload.trim_start_matches('/'));
    out.push_str(&text[insert_at..]);

    tracing::debug!("📁 Subroot `{}` appended to document root", payload);
    Ok(Cow::Owned(out))
}

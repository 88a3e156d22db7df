//! Free-text directive expansion
//!
//! Handles the text that reaches a vhost besides the template itself:
//! site placeholders in nginx directives, per-folder directive snippets and
//! the slot lines a template reserves for directive batches.

use crate::parser::normalize::normalize_line_breaks;
use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;
use vhostmerge_core::config::SiteContext;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(DOCROOT_CLIENT|DOCROOT|DOMAIN)\}").expect("placeholder pattern is valid")
});

static FOLDER_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(FOLDERMD5|FOLDER)\}").expect("folder placeholder pattern is valid")
});

/// Longest folder accepted in a folder snippet reference
const MAX_FOLDER_LEN: usize = 101;

/// Replace `{DOCROOT}`, `{DOCROOT_CLIENT}` and `{DOMAIN}` in one pass
pub fn expand_placeholders(text: &str, site: &SiteContext) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| match &caps[1] {
            "DOCROOT" => site.docroot.clone(),
            "DOCROOT_CLIENT" => site.docroot_client.clone(),
            _ => site.domain.clone(),
        })
        .into_owned()
}

/// Expand placeholders line by line after normalizing line breaks
pub fn expand_nginx_directives(text: &str, site: &SiteContext) -> String {
    normalize_line_breaks(text)
        .split('\n')
        .map(|line| expand_placeholders(line, site))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================
// Folder snippets
// ============================================================

/// A `folder:snippet_id` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSnippetRef {
    /// Normalized folder: no leading `/`, always a trailing `/`
    pub folder: String,
    pub snippet_id: u64,
}

/// Whether a folder may be used in a snippet reference
pub fn is_safe_folder(folder: &str) -> bool {
    let len = folder.chars().count();
    (2..=MAX_FOLDER_LEN).contains(&len)
        && !folder.starts_with('/')
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'))
        && !folder.contains("..")
        && !folder.contains("./")
        && !folder.contains("//")
}

impl FolderSnippetRef {
    /// Parse one reference line, `None` if it is malformed or unsafe
    pub fn parse(line: &str) -> Option<Self> {
        let (folder, id) = line.split_once(':')?;
        let folder = folder.trim();
        let snippet_id = id.trim().parse::<u64>().ok().filter(|id| *id > 0)?;

        if !is_safe_folder(folder) {
            tracing::warn!("⚠️ Ignoring folder snippet for unsafe folder {:?}", folder);
            return None;
        }

        let mut folder = folder.to_string();
        if !folder.ends_with('/') {
            folder.push('/');
        }
        Some(Self { folder, snippet_id })
    }

    /// Parse every valid reference in a multi-line text
    pub fn parse_all(text: &str) -> Vec<Self> {
        normalize_line_breaks(text.trim())
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .filter_map(Self::parse)
            .collect()
    }

    /// Hex MD5 of the normalized folder
    pub fn folder_md5(&self) -> String {
        hex::encode(Md5::digest(self.folder.as_bytes()))
    }

    /// Substitute `{FOLDER}` and `{FOLDERMD5}` in a snippet body
    pub fn expand(&self, snippet: &str) -> String {
        FOLDER_PLACEHOLDER
            .replace_all(snippet, |caps: &regex::Captures<'_>| match &caps[1] {
                "FOLDERMD5" => self.folder_md5(),
                _ => self.folder.clone(),
            })
            .into_owned()
    }
}

/// Append folder snippets to free-text directives.
///
/// `lookup` resolves a snippet id to its body; unknown ids are skipped.
pub fn append_folder_snippets<F>(directives: &str, refs: &[FolderSnippetRef], mut lookup: F) -> String
where
    F: FnMut(u64) -> Option<String>,
{
    let mut out = directives.to_string();
    for snippet_ref in refs {
        match lookup(snippet_ref.snippet_id) {
            Some(body) => {
                out.push_str("\n\n");
                out.push_str(&snippet_ref.expand(&body));
            }
            None => tracing::debug!("Snippet {} not available, skipping", snippet_ref.snippet_id),
        }
    }
    out
}

// ============================================================
// Template slots
// ============================================================

/// A line a template reserves for a directive batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveSlot {
    RewriteRules,
    ProxyDirectives,
    NginxDirectives,
}

impl DirectiveSlot {
    pub const ALL: [DirectiveSlot; 3] = [
        DirectiveSlot::RewriteRules,
        DirectiveSlot::ProxyDirectives,
        DirectiveSlot::NginxDirectives,
    ];

    /// The literal slot line, after trimming
    pub fn marker(self) -> &'static str {
        match self {
            DirectiveSlot::RewriteRules => "{REWRITE_RULES}",
            DirectiveSlot::ProxyDirectives => "{PROXY_DIRECTIVES}",
            DirectiveSlot::NginxDirectives => "{NGINX_DIRECTIVES}",
        }
    }

    fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        Self::ALL.into_iter().find(|slot| slot.marker() == trimmed)
    }
}

/// Replace every slot line with `fill(slot)`'s lines, indented like the slot.
///
/// An empty fill removes the slot line.
pub fn fill_slots<'a, F>(template: &str, mut fill: F) -> String
where
    F: FnMut(DirectiveSlot) -> Vec<&'a str>,
{
    let mut out: Vec<String> = Vec::new();

    for line in normalize_line_breaks(template).split('\n') {
        match DirectiveSlot::from_line(line) {
            Some(slot) => {
                let indent = &line[..line.len() - line.trim_start().len()];
                out.extend(fill(slot).into_iter().map(|l| format!("{}{}", indent, l)));
            }
            None => out.push(line.to_string()),
        }
    }

    out.join("\n")
}

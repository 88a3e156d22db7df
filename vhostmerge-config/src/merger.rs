//! Location merging and reassembly
//!
//! Folds every declaration of a selector into one block. Content follows the
//! last writer (replace) or accumulates (merge); position always follows the
//! first declaration. A selector deleted anywhere is dropped everywhere.

use crate::parser::location::{Annotation, LocationDeclaration, ResidualLine};
use std::collections::{HashMap, HashSet};

/// The merged state of one selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationBlock {
    pub selector: String,
    /// Annotation of the most recent declaration
    pub annotation: Annotation,
    /// Accumulated body lines
    pub body: Vec<String>,
    /// Line of the first declaration, anchors output order
    pub first_line: usize,
}

impl LocationBlock {
    /// Render as `location <selector> {`, body, `}`
    pub fn render(&self, indent: &str) -> String {
        let mut out = format!("{}location {} {{\n", indent, self.selector);
        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(indent);
        out.push('}');
        out
    }
}

/// All selectors of one vhost, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct LocationSet {
    blocks: Vec<LocationBlock>,
    index: HashMap<String, usize>,
    deleted: HashSet<String>,
}

impl LocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold declarations in input order
    pub fn from_declarations<I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = LocationDeclaration>,
    {
        let mut set = Self::new();
        for declaration in declarations {
            set.apply(declaration);
        }
        set
    }

    /// Apply one declaration
    pub fn apply(&mut self, declaration: LocationDeclaration) {
        let LocationDeclaration { selector, annotation, body, line } = declaration;

        let slot = match self.index.get(&selector) {
            Some(&slot) => slot,
            None => {
                self.index.insert(selector.clone(), self.blocks.len());
                self.blocks.push(LocationBlock {
                    selector: selector.clone(),
                    annotation,
                    body: Vec::new(),
                    first_line: line,
                });
                self.blocks.len() - 1
            }
        };

        let block = &mut self.blocks[slot];
        block.annotation = annotation;
        match annotation {
            Annotation::Replace => block.body = body,
            Annotation::Merge => block.body.extend(body),
            Annotation::Delete => {
                tracing::debug!("🗑️ Location `{}` marked for deletion at line {}", selector, line + 1);
                self.deleted.insert(selector);
            }
        }
    }

    /// Whether the selector was deleted by any declaration
    pub fn is_deleted(&self, selector: &str) -> bool {
        self.deleted.contains(selector)
    }

    /// Selectors marked for deletion
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.deleted.iter().map(String::as_str)
    }

    /// Blocks that survive deletion, in order of first appearance
    pub fn surviving(&self) -> impl Iterator<Item = &LocationBlock> {
        self.blocks.iter().filter(|b| !self.deleted.contains(&b.selector))
    }

    pub fn get(&self, selector: &str) -> Option<&LocationBlock> {
        self.index.get(selector).map(|&slot| &self.blocks[slot])
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Interleave surviving blocks with residual lines by line index
    pub fn reassemble(&self, residual: &[ResidualLine], indent: &str) -> String {
        let mut entries: Vec<(usize, String)> = residual
            .iter()
            .map(|r| (r.line, r.text.clone()))
            .chain(self.surviving().map(|b| (b.first_line, b.render(indent))))
            .collect();
        entries.sort_by_key(|(line, _)| *line);

        let text: Vec<String> = entries.into_iter().map(|(_, text)| text).collect();
        text.join("\n").trim().to_string()
    }
}

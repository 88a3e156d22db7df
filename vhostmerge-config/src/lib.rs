//! Vhostmerge Configuration Assembly
//!
//! This crate validates user-supplied nginx directives and merges the
//! `location` blocks contributed by a site, its aliases and custom snippets
//! into one vhost file.
//!
//! # Example
//!
//! ```rust,ignore
//! use vhostmerge_config::assemble;
//!
//! let rendered = r#"
//! server {
//!     location / {
//!         index index.html;
//!     }
//!     location / { ##merge##
//!         expires 1h;
//!     }
//! }
//! "#;
//!
//! let config = assemble(rendered).unwrap();
//! assert!(config.warnings.is_empty());
//! ```

pub mod assembly;
pub mod diagnostics;
pub mod merger;
pub mod parser;
pub mod snippets;
pub mod subroot;

pub use assembly::{AssembledConfig, AssemblyWarning, DirectiveOutcome, VhostAssembler, VhostSources};
pub use diagnostics::render_rejection;
pub use merger::{LocationBlock, LocationSet};
pub use parser::{
    parse_locations, Annotation, DirectiveBatch, DirectiveError, DirectiveKind, DirectiveLine,
    LocationDeclaration, LocationScan,
};
pub use snippets::{DirectiveSlot, FolderSnippetRef};
pub use subroot::{expand_subroot, SubrootError};

use vhostmerge_core::config::AssemblyConfig;

/// Assemble rendered vhost text with the default configuration
pub fn assemble(rendered: &str) -> vhostmerge_core::Result<AssembledConfig> {
    VhostAssembler::new(AssemblyConfig::default()).assemble(rendered)
}

/// Validate custom rewrite or proxy directives
pub fn validate_directives(raw: &str) -> Result<DirectiveBatch, DirectiveError> {
    DirectiveBatch::parse(raw)
}

//! Parser module for vhost text
//!
//! This module provides the declaration lexer, the directive grammar
//! validator, single-line block normalization and the location block parser.

pub mod directive;
pub mod lexer;
pub mod location;
pub mod normalize;

pub use directive::{classify, DirectiveBatch, DirectiveError, DirectiveKind, DirectiveLine};
pub use lexer::{tokenize, LexError, Location, Spanned, Token};
pub use location::{
    parse_declaration, parse_locations, Annotation, LocationDeclaration, LocationParser,
    LocationScan, ResidualLine,
};
pub use normalize::{expand_declaration, normalize_line_breaks, normalize_vhost};

//! Configuration module
//!
//! Settings for the vhost assembly pipeline and the site context used for
//! placeholder expansion.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;

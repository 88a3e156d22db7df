//! Vhostmerge Core Library
//!
//! This crate provides the shared building blocks for vhostmerge:
//! the error type and the assembly configuration.

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Vhostmerge version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

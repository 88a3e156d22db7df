//! Error types for vhostmerge

use thiserror::Error;

/// Result type for vhostmerge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vhostmerge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rendered vhost text exceeds the configured ceiling
    #[error("Vhost text is {size} bytes, limit is {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

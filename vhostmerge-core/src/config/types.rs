//! Configuration type definitions
//!
//! These types represent the runtime configuration for the assembly pipeline.

use serde::{Deserialize, Serialize};

/// Root configuration for vhost assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Spaces prepended to emitted `location` open and close lines
    #[serde(default = "default_location_indent")]
    pub location_indent: usize,

    /// Maximum size of rendered vhost text in bytes (default: 1MB)
    #[serde(default = "default_max_vhost_bytes")]
    pub max_vhost_bytes: usize,

    /// Drop whole-line `#` comments while normalizing
    #[serde(default = "default_true")]
    pub strip_comments: bool,

    /// Site values for free-text directive placeholders
    #[serde(default)]
    pub site: SiteContext,
}

fn default_location_indent() -> usize {
    8
}

fn default_max_vhost_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            location_indent: default_location_indent(),
            max_vhost_bytes: default_max_vhost_bytes(),
            strip_comments: true,
            site: SiteContext::default(),
        }
    }
}

impl AssemblyConfig {
    /// Indentation prefix for emitted location lines
    pub fn indent(&self) -> String {
        " ".repeat(self.location_indent)
    }
}

/// Site values substituted into free-text directives
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SiteContext {
    /// Document root served for the www host (`{DOCROOT}`)
    #[serde(default)]
    pub docroot: String,

    /// Client document root (`{DOCROOT_CLIENT}`)
    #[serde(default)]
    pub docroot_client: String,

    /// Primary domain (`{DOMAIN}`)
    #[serde(default)]
    pub domain: String,
}

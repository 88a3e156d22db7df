//! Configuration loader

use crate::config::AssemblyConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Configuration loader for various formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AssemblyConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        tracing::debug!("📋 Loading assembly config from {}", path.display());

        match ext {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown config format: {}", ext))),
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<AssemblyConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<AssemblyConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_loading() {
        let json = r#"{"location_indent": 4}"#;
        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.location_indent, 4);
        assert!(config.strip_comments);
    }

    #[test]
    fn test_toml_loading() {
        let toml = r#"
            max_vhost_bytes = 2048
            strip_comments = false

            [site]
            docroot = "/var/www/example.com/web"
            domain = "example.com"
        "#;
        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.max_vhost_bytes, 2048);
        assert!(!config.strip_comments);
        assert_eq!(config.location_indent, 8);
        assert_eq!(config.site.domain, "example.com");
        assert_eq!(config.site.docroot_client, "");
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConfigLoader::from_toml("location_indent = \"wide\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load("/nonexistent/vhostmerge.toml").unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_unknown_extension() {
        let mut path = std::env::temp_dir();
        path.push("vhostmerge-loader-test.yaml");
        std::fs::write(&path, "location_indent: 2").unwrap();
        let err = ConfigLoader::load(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, Error::Config(msg) if msg.contains("yaml")));
    }
}

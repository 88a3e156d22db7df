//! Vhost assembly pipeline
//!
//! subroot expansion → normalization → block parsing → merging → reassembly.
//! Every problem on the way degrades to "keep the base configuration" and is
//! reported as an [`AssemblyWarning`]; only an oversized input is an error.

use crate::merger::LocationSet;
use crate::parser::directive::{DirectiveBatch, DirectiveError};
use crate::parser::location::parse_locations;
use crate::parser::normalize::normalize_vhost;
use crate::snippets::{expand_nginx_directives, fill_slots, DirectiveSlot};
use crate::subroot::{expand_subroot, SubrootError};
use thiserror::Error;
use vhostmerge_core::config::AssemblyConfig;
use vhostmerge_core::error::{Error, Result};

/// Non-fatal conditions met while assembling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyWarning {
    #[error("Rewrite rules rejected, none applied: {0}")]
    RewriteRulesRejected(DirectiveError),

    #[error("Proxy directives rejected, none applied: {0}")]
    ProxyDirectivesRejected(DirectiveError),

    #[error("Subroot not applied: {0}")]
    Subroot(SubrootError),

    #[error("Second server container at line {line}, locations after it are not merged")]
    OverrunContainer { line: usize },

    #[error("Location `{selector}` at line {line} is never closed, left as is")]
    UnterminatedBlock { selector: String, line: usize },
}

/// Outcome of validating one user-supplied directive text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveOutcome {
    /// Accepted lines; empty when rejected
    pub batch: DirectiveBatch,
    pub rejection: Option<DirectiveError>,
}

impl DirectiveOutcome {
    /// Validate, falling back to an empty batch on rejection
    pub fn evaluate(raw: &str) -> Self {
        match DirectiveBatch::parse(raw) {
            Ok(batch) => Self { batch, rejection: None },
            Err(e) => Self {
                batch: DirectiveBatch::default(),
                rejection: Some(e),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }

    fn lines(&self) -> Vec<&str> {
        self.batch.texts().collect()
    }
}

/// Inputs for one vhost
#[derive(Debug, Clone, Copy, Default)]
pub struct VhostSources<'a> {
    /// Rendered template, possibly with directive slot lines
    pub template: &'a str,
    /// User rewrite rules, grammar-validated
    pub rewrite_rules: Option<&'a str>,
    /// User proxy directives, grammar-validated
    pub proxy_directives: Option<&'a str>,
    /// Free-text nginx directives, placeholder-expanded only
    pub nginx_directives: Option<&'a str>,
}

impl<'a> VhostSources<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            ..Default::default()
        }
    }
}

/// Final text plus everything that was skipped along the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledConfig {
    pub text: String,
    pub warnings: Vec<AssemblyWarning>,
}

impl AssembledConfig {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs the assembly pipeline with one configuration
#[derive(Debug, Clone, Default)]
pub struct VhostAssembler {
    config: AssemblyConfig,
}

impl VhostAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Assemble an already rendered vhost text
    pub fn assemble(&self, rendered: &str) -> Result<AssembledConfig> {
        self.run(rendered, Vec::new())
    }

    /// Fill directive slots, then assemble
    pub fn assemble_sources(&self, sources: &VhostSources<'_>) -> Result<AssembledConfig> {
        self.check_size(sources.template)?;
        let mut warnings = Vec::new();

        let rewrites = DirectiveOutcome::evaluate(sources.rewrite_rules.unwrap_or_default());
        if let Some(e) = &rewrites.rejection {
            tracing::warn!("⚠️ Custom rewrite rules rejected: {}", e);
            warnings.push(AssemblyWarning::RewriteRulesRejected(e.clone()));
        }

        let proxy = DirectiveOutcome::evaluate(sources.proxy_directives.unwrap_or_default());
        if let Some(e) = &proxy.rejection {
            tracing::warn!("⚠️ Custom proxy directives rejected: {}", e);
            warnings.push(AssemblyWarning::ProxyDirectivesRejected(e.clone()));
        }

        let nginx = sources
            .nginx_directives
            .map(|raw| expand_nginx_directives(raw, &self.config.site))
            .unwrap_or_default();

        let filled = fill_slots(sources.template, |slot| match slot {
            DirectiveSlot::RewriteRules => rewrites.lines(),
            DirectiveSlot::ProxyDirectives => proxy.lines(),
            DirectiveSlot::NginxDirectives if nginx.trim().is_empty() => Vec::new(),
            DirectiveSlot::NginxDirectives => nginx.split('\n').collect(),
        });

        self.run(&filled, warnings)
    }

    fn run(&self, text: &str, mut warnings: Vec<AssemblyWarning>) -> Result<AssembledConfig> {
        self.check_size(text)?;

        let expanded = match expand_subroot(text) {
            Ok(expanded) => expanded,
            Err(e) => {
                tracing::warn!("⚠️ {}", e);
                warnings.push(AssemblyWarning::Subroot(e));
                text.into()
            }
        };

        let normalized = normalize_vhost(&expanded, self.config.strip_comments);
        let scan = parse_locations(&normalized);

        if let Some(line) = scan.overrun_at {
            warnings.push(AssemblyWarning::OverrunContainer { line: line + 1 });
        }
        warnings.extend(scan.unterminated.iter().map(|d| AssemblyWarning::UnterminatedBlock {
            selector: d.selector.clone(),
            line: d.line + 1,
        }));

        let declared = scan.declarations.len();
        let locations = LocationSet::from_declarations(scan.declarations);
        let text = locations.reassemble(&scan.residual, &self.config.indent());

        tracing::debug!(
            "✅ Assembled vhost: {} declaration(s) merged into {} location(s), {} deleted, {} warning(s)",
            declared,
            locations.surviving().count(),
            locations.deleted().count(),
            warnings.len()
        );

        Ok(AssembledConfig { text, warnings })
    }

    fn check_size(&self, text: &str) -> Result<()> {
        if text.len() > self.config.max_vhost_bytes {
            return Err(Error::InputTooLarge {
                size: text.len(),
                limit: self.config.max_vhost_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> VhostAssembler {
        VhostAssembler::new(AssemblyConfig {
            location_indent: 4,
            ..Default::default()
        })
    }

    #[test]
    fn test_merge_scenario() {
        let text = "location /x {\nA\n}\nlocation /x { ##merge##\nB\n}";
        let out = assembler().assemble(text).unwrap();
        // Leading indentation of the first line is trimmed with the rest
        assert_eq!(out.text, "location /x {\nA\nB\n    }");
        assert!(out.is_clean());
    }

    #[test]
    fn test_delete_scenario() {
        let text = "keep;\nlocation /y {\nA\n}\nlocation /y { ##delete##\n}";
        let out = assembler().assemble(text).unwrap();
        assert_eq!(out.text, "keep;");
    }

    #[test]
    fn test_one_liner_matches_multi_line() {
        let a = assembler().assemble("location /z { return 404; }").unwrap();
        let b = assembler().assemble("location /z {\n return 404;\n}").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text, "location /z {\n return 404;\n    }");
    }

    #[test]
    fn test_first_declaration_keeps_position() {
        let text = "residual;\nlocation /a {\n  a1;\n}\nlocation /b {\n  b1;\n}\nlocation /a { ##merge##\n  a2;\n}";
        let out = assembler().assemble(text).unwrap();
        assert_eq!(
            out.text,
            "residual;\n    location /a {\n  a1;\n  a2;\n    }\n    location /b {\n  b1;\n    }"
        );
    }

    #[test]
    fn test_second_pass_is_noop() {
        let text = "server {\n    root /srv/;\n    location / {\n        index index.html;\n    }\n    location ~ \\.php$ { fastcgi_pass php; }\n    location / { ##merge##\n        expires 1h;\n    }\n}";
        let first = assembler().assemble(text).unwrap();
        let second = assembler().assemble(&first.text).unwrap();
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn test_second_pass_is_noop_nested_one_liner() {
        let text = "server {\n    location /a { location /a/b { deny all; } }\n}";
        let first = assembler().assemble(text).unwrap();
        assert_eq!(
            first.text,
            "server {\n    location /a {\n location /a/b {\n deny all;\n }\n    }\n}"
        );
        let second = assembler().assemble(&first.text).unwrap();
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn test_unsafe_subroot_warns_and_keeps_root() {
        let text = "root /srv/;\n##subroot ../../etc ##";
        let out = assembler().assemble(text).unwrap();
        assert_eq!(out.text, "root /srv/;");
        assert_eq!(
            out.warnings,
            vec![AssemblyWarning::Subroot(SubrootError::UnsafePayload {
                payload: "../../etc".to_string()
            })]
        );
    }

    #[test]
    fn test_safe_subroot() {
        let out = assembler().assemble("root /srv/;\n##subroot app/v1 ##").unwrap();
        assert_eq!(out.text, "root /srv/app/v1;");
    }

    #[test]
    fn test_size_ceiling() {
        let assembler = VhostAssembler::new(AssemblyConfig {
            max_vhost_bytes: 8,
            ..Default::default()
        });
        let err = assembler.assemble("root /var/www;").unwrap_err();
        assert!(matches!(err, Error::InputTooLarge { size: 14, limit: 8 }));
    }

    #[test]
    fn test_sources_fail_closed() {
        let template = "server {\n    {REWRITE_RULES}\n    {NGINX_DIRECTIVES}\n}";
        let sources = VhostSources {
            template,
            rewrite_rules: Some("rewrite ^/a /b;\ngarbage"),
            nginx_directives: Some("location /d { alias {DOCROOT}/d; }"),
            ..Default::default()
        };
        let mut config = AssemblyConfig::default();
        config.site.docroot = "/srv".to_string();

        let out = VhostAssembler::new(config).assemble_sources(&sources).unwrap();
        assert!(!out.text.contains("rewrite"));
        assert!(out.text.contains("        location /d {\n alias /srv/d;\n        }"));
        assert!(matches!(
            out.warnings.as_slice(),
            [AssemblyWarning::RewriteRulesRejected(DirectiveError::InvalidLine { line: 2, .. })]
        ));
    }

    #[test]
    fn test_sources_accepted_rules() {
        let template = "server {\n  {REWRITE_RULES}\n}";
        let sources = VhostSources {
            template,
            rewrite_rules: Some("if (!-e $request_filename) {\n  rewrite ^ /index.php last;\n}"),
            ..Default::default()
        };
        let out = assembler().assemble_sources(&sources).unwrap();
        assert_eq!(
            out.text,
            "server {\n  if (!-e $request_filename) {\n    rewrite ^ /index.php last;\n  }\n}"
        );
    }

    #[test]
    fn test_overrun_and_unterminated_warnings() {
        let text = "server {\nlocation /a {\nx;\n}\n}\nserver {\nlocation /a {\ny;\n}\n}";
        let out = assembler().assemble(text).unwrap();
        assert_eq!(out.warnings, vec![AssemblyWarning::OverrunContainer { line: 6 }]);
        assert!(out.text.ends_with("server {\nlocation /a {\ny;\n}\n}"));

        let out = assembler().assemble("location /open {\n  x;").unwrap();
        assert_eq!(out.text, "location /open {\n  x;");
        assert_eq!(
            out.warnings,
            vec![AssemblyWarning::UnterminatedBlock { selector: "/open".to_string(), line: 1 }]
        );
    }
}

//! Vhostmerge - nginx vhost assembly
//!
//! This is the main entry point for the vhostmerge CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vhostmerge_config::snippets::append_folder_snippets;
use vhostmerge_config::{
    render_rejection, DirectiveBatch, FolderSnippetRef, VhostAssembler, VhostSources,
};
use vhostmerge_core::config::{AssemblyConfig, ConfigLoader};

/// Vhostmerge - validate custom directives and merge nginx location blocks
#[derive(Parser)]
#[command(name = "vhostmerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a rendered vhost file
    Assemble {
        /// Rendered vhost template
        vhost: PathBuf,

        /// Custom rewrite rules for the {REWRITE_RULES} slot
        #[arg(long)]
        rewrites: Option<PathBuf>,

        /// Custom proxy directives for the {PROXY_DIRECTIVES} slot
        #[arg(long)]
        proxy: Option<PathBuf>,

        /// Free-text nginx directives for the {NGINX_DIRECTIVES} slot
        #[arg(long)]
        directives: Option<PathBuf>,

        /// `folder:snippet_id` lines appended to the free-text directives
        #[arg(long, requires = "snippets_dir")]
        folder_snippets: Option<PathBuf>,

        /// Directory holding snippet bodies as `<id>.conf`
        #[arg(long)]
        snippets_dir: Option<PathBuf>,

        /// Assembly configuration (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a custom rewrite or proxy directive file
    Check {
        /// Directive file
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Assemble {
            vhost,
            rewrites,
            proxy,
            directives,
            folder_snippets,
            snippets_dir,
            config,
            output,
        } => {
            let config = match config {
                Some(path) => ConfigLoader::load(&path)?,
                None => AssemblyConfig::default(),
            };

            let template = read(&vhost)?;
            let rewrites = rewrites.as_deref().map(read).transpose()?;
            let proxy = proxy.as_deref().map(read).transpose()?;
            let mut directives = directives.as_deref().map(read).transpose()?;

            if let (Some(refs), Some(dir)) = (folder_snippets, snippets_dir) {
                let refs = FolderSnippetRef::parse_all(&read(&refs)?);
                tracing::debug!("📎 {} folder snippet(s) referenced", refs.len());
                let base = directives.take().unwrap_or_default();
                directives = Some(append_folder_snippets(&base, &refs, |id| {
                    std::fs::read_to_string(dir.join(format!("{}.conf", id))).ok()
                }));
            }

            let sources = VhostSources {
                template: &template,
                rewrite_rules: rewrites.as_deref(),
                proxy_directives: proxy.as_deref(),
                nginx_directives: directives.as_deref(),
            };

            tracing::info!("🔧 Assembling {}", vhost.display());
            let assembled = VhostAssembler::new(config).assemble_sources(&sources)?;

            for warning in &assembled.warnings {
                tracing::warn!("⚠️ {}", warning);
            }

            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", assembled.text))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("✅ Wrote {}", path.display());
                }
                None => println!("{}", assembled.text),
            }
        }

        Commands::Check { file } => {
            let raw = read(&file)?;
            match DirectiveBatch::parse(&raw) {
                Ok(batch) => {
                    println!("✅ {} line(s) accepted", batch.len());
                }
                Err(e) => {
                    let name = file.display().to_string();
                    eprintln!("{}", render_rejection(&name, &raw, &e));
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("vhostmerge {}", vhostmerge_core::VERSION);
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

//! # kiln CLI
//!
//! Inspect content packs and the migration cache from a shell.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_config::logging::{init_logging, Component, LogLevel};

mod cache;
mod pack;

/// Kiln - caching layer for versioned content assets
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Migration cache root (overrides config and KILN_CACHE_ROOT)
    #[arg(long = "cache-root", global = true)]
    cache_root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List namespaces of a pack
    Namespaces(pack::NamespacesArgs),

    /// List asset identifiers under a prefix
    List(pack::ListArgs),

    /// Check whether a path exists in a pack
    Exists(pack::ExistsArgs),

    /// Inspect or clear the migration cache
    Cache(cache::CacheArgs),

    /// Print the content hash of a file
    Hash {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let mut config = kiln_config::config().clone();
    if let Some(root) = &cli.cache_root {
        config.storage.cache_root = root.clone();
    }
    let cache_root = config.storage.cache_root.clone();
    tracing::debug!(
        component = Component::CLI,
        cache_root = %cache_root.display(),
        "Resolved cache root"
    );

    match cli.command {
        Commands::Namespaces(args) => pack::namespaces(args),
        Commands::List(args) => pack::list(args),
        Commands::Exists(args) => pack::exists(args),
        Commands::Cache(args) => cache::run(&cache_root, args),
        Commands::Hash { file } => cmd_hash(&file),
        Commands::Config { default } => cmd_config(&config, default),
    }
}

fn cmd_hash(file: &std::path::Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}  {}", kiln_migrate::content_hash(&bytes), file.display());
    Ok(())
}

fn cmd_config(config: &kiln_config::Config, default: bool) -> Result<()> {
    let rendered = if default {
        kiln_config::Config::default_toml()
    } else {
        toml::to_string_pretty(config).context("Failed to render configuration")?
    };
    print!("{}", rendered);
    Ok(())
}

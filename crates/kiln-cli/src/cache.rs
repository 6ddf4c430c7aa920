//! Migration cache maintenance.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use kiln_migrate::MigrationCacheStore;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommands,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Entry count and size on disk
    Stats,
    /// Delete every cached entry
    Clear,
}

pub fn run(cache_root: &Path, args: CacheArgs) -> Result<()> {
    let store = MigrationCacheStore::new(cache_root)
        .with_context(|| format!("Failed to open migration cache at {}", cache_root.display()))?;

    match args.command {
        CacheCommands::Stats => {
            let stats = store.stats().context("Failed to read cache statistics")?;
            println!("Cache:   {}", store.dir().display());
            println!("Entries: {}", stats.entry_count);
            println!("Size:    {}", format_bytes(stats.total_bytes));
        }
        CacheCommands::Clear => {
            let removed = store.clear().context("Failed to clear cache")?;
            println!("Removed {} entries from {}", removed, store.dir().display());
        }
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

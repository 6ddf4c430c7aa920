//! # kiln-config
//!
//! Configuration management for Kiln.
//!
//! Loads configuration from:
//! 1. `~/.kiln/config.toml` (global)
//! 2. `.kiln/config.toml` (project-local, overrides global per section)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::debug;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub listing: ListingConfig,
    pub rebuild: RebuildConfig,
}

/// Project-level overlay: any section present replaces the global one.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    storage: Option<StorageConfig>,
    listing: Option<ListingConfig>,
    rebuild: Option<RebuildConfig>,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Some(Path::new(".kiln/config.toml")))
    }

    /// Load config from explicit global/project paths, then apply the
    /// environment. Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global.filter(|p| p.exists()) {
            debug!("Loading global config from {:?}", global_path);
            let contents = std::fs::read_to_string(global_path)?;
            config = toml::from_str(&contents)?;
        }

        if let Some(project_path) = project.filter(|p| p.exists()) {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            let overlay: ConfigOverlay = toml::from_str(&contents)?;
            config.merge(overlay);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Global config path: ~/.kiln/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".kiln/config.toml"))
    }

    fn merge(&mut self, overlay: ConfigOverlay) {
        if let Some(storage) = overlay.storage {
            self.storage = storage;
        }
        if let Some(listing) = overlay.listing {
            self.listing = listing;
        }
        if let Some(rebuild) = overlay.rebuild {
            self.rebuild = rebuild;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KILN_CACHE_ROOT") {
            self.storage.cache_root = PathBuf::from(path);
        }
        if let Ok(value) = std::env::var("KILN_REBUILD_BACKGROUND") {
            if let Some(flag) = parse_bool(&value) {
                self.rebuild.background = flag;
            }
        }
        if let Ok(threads) = std::env::var("KILN_WARMUP_THREADS") {
            if let Ok(n) = threads.parse() {
                self.rebuild.warmup_threads = Some(n);
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Migration cache storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the migration cache (a versioned subdirectory is created inside)
    pub cache_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let cache_root = dirs::home_dir()
            .map(|h| h.join(".kiln/cache"))
            .unwrap_or_else(|| PathBuf::from(".kiln/cache"));
        Self { cache_root }
    }
}

/// Pack listing cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Files with this suffix are indexed for existence checks only
    pub metadata_suffix: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            metadata_suffix: ".mcmeta".to_string(),
        }
    }
}

/// Derived-data rebuild scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Run rebuild jobs on a background worker instead of the caller thread
    pub background: bool,
    /// How long a superseding trigger waits for the old job to stop
    pub supersede_timeout_secs: u64,
    /// Target groups precomputed in parallel before the sequential pass
    pub warmup_groups: Vec<String>,
    /// Warm-up pool size (None = auto)
    pub warmup_threads: Option<usize>,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            background: true,
            supersede_timeout_secs: 10,
            warmup_groups: Vec::new(),
            warmup_threads: None,
        }
    }
}

impl RebuildConfig {
    pub fn supersede_timeout(&self) -> Duration {
        Duration::from_secs(self.supersede_timeout_secs)
    }
}

//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A temporary migration cache root
//! - A temporary content pack root with `assets/` and `data/` trees
//!
//! # Usage
//!
//! ```ignore
//! use kiln_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new().unwrap();
//! env.create_pack_file("assets/demo/models/a.json", b"{}").unwrap();
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Isolated migration cache root
    pub cache_root: PathBuf,
    /// Root of a content pack for listing tests
    pub pack_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let cache_root = root.join("cache");
        let pack_root = root.join(format!("pack-{}", test_id));

        std::fs::create_dir_all(&cache_root)?;
        std::fs::create_dir_all(&pack_root)?;

        Ok(Self {
            _temp_dir: temp_dir,
            cache_root,
            pack_root,
            test_id,
        })
    }

    /// Config pointing at this environment's cache root
    pub fn config(&self) -> crate::Config {
        let mut cfg = crate::Config::default();
        cfg.storage.cache_root = self.cache_root.clone();
        cfg
    }

    /// Create a file inside the pack root
    pub fn create_pack_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.pack_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a directory inside the pack root
    pub fn create_pack_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.pack_root.join(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Remove a file from the pack root
    pub fn remove_pack_file(&self, relative_path: &str) -> anyhow::Result<()> {
        std::fs::remove_file(self.pack_root.join(relative_path))?;
        Ok(())
    }
}

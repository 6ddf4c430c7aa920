//! On-disk store for upgraded payloads.
//!
//! One file per `(AssetId, ContentHash)` pair. All reads and writes are
//! serialized behind a single store-wide mutex; migrations are rare, so
//! correctness wins over throughput here.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use kiln_config::{log_migrate_debug, log_migrate_warn};
use kiln_ids::AssetId;
use parking_lot::Mutex;
use tracing::instrument;

use crate::{ContentHash, Payload, Result};

/// Versioned subdirectory holding cache entries.
pub const CACHE_DIR_NAME: &str = "migrationCacheV1";

/// Extension of cache entry files.
pub const CACHE_FILE_EXT: &str = "gz";

/// Migration cache store
///
/// Exclusively owns its directory; nothing else should read or write it.
#[derive(Debug)]
pub struct MigrationCacheStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl MigrationCacheStore {
    /// Open a store under `root`, creating `root/migrationCacheV1` if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let dir = root.as_ref().join(CACHE_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Open the store at the configured cache root.
    pub fn from_config(config: &kiln_config::Config) -> Result<Self> {
        Self::new(&config.storage.cache_root)
    }

    /// File name for an entry: `{namespace}_{flattened path}_{hex}.gz`.
    pub fn cache_file_name(id: &AssetId, hash: &ContentHash) -> String {
        format!(
            "{}_{}_{}.{}",
            id.namespace(),
            id.flattened_path(),
            hash.to_hex(),
            CACHE_FILE_EXT
        )
    }

    pub fn entry_path(&self, id: &AssetId, hash: &ContentHash) -> PathBuf {
        self.dir.join(Self::cache_file_name(id, hash))
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up an upgraded payload.
    ///
    /// Returns `Some` only for a readable, decodable entry whose version tag
    /// equals `target_version`. Every other outcome is a miss.
    #[instrument(skip_all, level = "debug", fields(id = %id, hash = %hash))]
    pub fn lookup(&self, id: &AssetId, hash: &ContentHash, target_version: u32) -> Option<Payload> {
        let path = self.entry_path(id, hash);

        let bytes = {
            let _guard = self.lock.lock();
            match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
                Err(e) => {
                    log_migrate_warn!(
                        "Unreadable cache entry",
                        path = display(path.display()),
                        error = display(&e)
                    );
                    return None;
                }
            }
        };

        let payload = match Payload::decode(&bytes) {
            Ok(payload) => payload,
            Err(e) => {
                log_migrate_warn!(
                    "Corrupt cache entry",
                    path = display(path.display()),
                    error = display(&e)
                );
                return None;
            }
        };

        match payload.version() {
            Some(v) if v == target_version => Some(payload),
            found => {
                log_migrate_debug!(
                    "Stale cache entry",
                    found = display(format!("{:?}", found)),
                    target = target_version
                );
                None
            }
        }
    }

    /// Persist an upgraded payload, replacing any previous entry.
    ///
    /// Uses a unique temp file plus rename so a reader never sees a partial
    /// entry.
    #[instrument(skip_all, level = "debug", fields(id = %id, hash = %hash))]
    pub fn store(&self, id: &AssetId, hash: &ContentHash, payload: &Payload) -> Result<()> {
        let encoded = payload.encode()?;
        let path = self.entry_path(id, hash);

        let _guard = self.lock.lock();
        fs::create_dir_all(&self.dir)?;

        let temp_path = path.with_file_name(format!(
            "{}.{}.tmp",
            Self::cache_file_name(id, hash),
            std::process::id()
        ));
        let write = || -> io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Check whether an entry file exists, regardless of its version.
    pub fn contains(&self, id: &AssetId, hash: &ContentHash) -> bool {
        let _guard = self.lock.lock();
        self.entry_path(id, hash).is_file()
    }

    /// Count entries and bytes on disk.
    pub fn stats(&self) -> Result<CacheStats> {
        let _guard = self.lock.lock();
        let mut stats = CacheStats::default();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() || !is_entry_file(&entry.path()) {
                continue;
            }
            stats.entry_count += 1;
            stats.total_bytes += entry.metadata()?.len();
        }

        Ok(stats)
    }

    /// Delete every entry (and stray temp files). Returns the number of
    /// entries removed.
    pub fn clear(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let counted = is_entry_file(&path);
            fs::remove_file(&path)?;
            if counted {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CACHE_FILE_EXT)
}

/// Statistics about the migration cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entry files
    pub entry_count: u64,
    /// Total compressed bytes on disk
    pub total_bytes: u64,
}

//! Versioned asset loading on top of the migration cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kiln_config::{log_migrate_debug, log_migrate_warn};
use kiln_ids::AssetId;

use crate::{content_hash, MigrateError, MigrationCacheStore, Payload, Result, TransformError};

/// Host-supplied upgrade from one schema version to another.
///
/// Called at most once per cache miss. Any closure of the form
/// `Fn(Payload, u32, u32) -> Result<Payload, E>` implements this trait.
pub trait PayloadTransform {
    type Error: Into<TransformError>;

    fn upgrade(&self, payload: Payload, from: u32, to: u32) -> std::result::Result<Payload, Self::Error>;
}

impl<F, E> PayloadTransform for F
where
    F: Fn(Payload, u32, u32) -> std::result::Result<Payload, E>,
    E: Into<TransformError>,
{
    type Error = E;

    fn upgrade(&self, payload: Payload, from: u32, to: u32) -> std::result::Result<Payload, E> {
        self(payload, from, to)
    }
}

/// Snapshot of loader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Loads that needed no upgrade
    pub up_to_date: u64,
    /// Upgrades served from the store
    pub cache_hits: u64,
    /// Transform invocations
    pub migrations: u64,
    /// Upgraded payloads that could not be persisted
    pub persist_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    up_to_date: AtomicU64,
    cache_hits: AtomicU64,
    migrations: AtomicU64,
    persist_failures: AtomicU64,
}

/// Decodes raw asset bytes and upgrades them to a target version, consulting
/// the migration cache before running the transform.
#[derive(Debug, Clone)]
pub struct VersionedAssetLoader {
    store: Arc<MigrationCacheStore>,
    counters: Arc<Counters>,
}

impl VersionedAssetLoader {
    pub fn new(store: Arc<MigrationCacheStore>) -> Self {
        Self {
            store,
            counters: Arc::default(),
        }
    }

    pub fn store(&self) -> &MigrationCacheStore {
        &self.store
    }

    /// Load an asset at `target_version`.
    ///
    /// Payloads already at or above the target are returned as decoded. Older
    /// payloads are looked up by content hash; on a miss the transform runs,
    /// the result is stamped with `target_version` and persisted. A failed
    /// persist is logged and the upgraded payload is still returned.
    pub fn load<T>(
        &self,
        id: &AssetId,
        raw: &[u8],
        target_version: u32,
        transform: &T,
    ) -> Result<Payload>
    where
        T: PayloadTransform + ?Sized,
    {
        let mut payload = Payload::decode(raw)?;
        let current = payload.ensure_version();

        if current >= target_version {
            self.counters.up_to_date.fetch_add(1, Ordering::Relaxed);
            return Ok(payload);
        }

        let hash = content_hash(raw);

        if let Some(cached) = self.store.lookup(id, &hash, target_version) {
            log_migrate_debug!("Using cached upgraded version", id = display(id));
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        log_migrate_debug!(
            "Running upgrade; this delays loading",
            id = display(id),
            hash = display(&hash),
            from = current,
            to = target_version
        );
        let mut upgraded = transform
            .upgrade(payload, current, target_version)
            .map_err(|e| MigrateError::Transform(e.into()))?;
        upgraded.set_version(target_version);
        self.counters.migrations.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.store.store(id, &hash, &upgraded) {
            log_migrate_warn!(
                "Failed to persist upgraded payload",
                id = display(id),
                error = display(&e)
            );
            self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
        }

        Ok(upgraded)
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            up_to_date: self.counters.up_to_date.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            migrations: self.counters.migrations.load(Ordering::Relaxed),
            persist_failures: self.counters.persist_failures.load(Ordering::Relaxed),
        }
    }
}

//! Per-pack listing cache.
//!
//! All cached state of one pack lives in a single generation object. Queries
//! clone the current generation `Arc` under a brief read lock and then work
//! on it lock-free; [`ListingCache::invalidate`] swaps in an empty
//! generation. A reader therefore sees either the complete old state or the
//! complete new state, never a mix.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use kiln_config::{log_listing_debug, log_listing_warn};
use kiln_ids::{is_valid_path, join_components, normalize_slashes, AssetId, SEPARATOR};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{ListingCacheRegistry, PackSource, PackType};

/// One enumerable file of a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPath {
    /// Path as reported by the source, relative to the namespace directory
    pub relative: PathBuf,
    /// Same path joined with `/`
    pub normalized: String,
}

/// Fully built listing of one pack.
#[derive(Debug, Default)]
pub struct PackListing {
    listings: [HashMap<String, Vec<ListedPath>>; 2],
    contained: HashSet<String>,
}

impl PackListing {
    /// Listed (non-metadata) files of one namespace, in walk order.
    pub fn entries(&self, pack_type: PackType, namespace: &str) -> &[ListedPath] {
        self.listings[pack_type.index()]
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Membership test against `"{root}/{namespace}/{path}"` keys.
    pub fn contains(&self, key: &str) -> bool {
        self.contained.contains(key)
    }

    /// Number of files in the existence set, metadata included.
    pub fn contained_len(&self) -> usize {
        self.contained.len()
    }
}

struct Generation {
    id: u64,
    namespaces: [OnceCell<Arc<BTreeSet<String>>>; 2],
    listing: OnceCell<Arc<PackListing>>,
}

impl Generation {
    fn new(id: u64) -> Self {
        Self {
            id,
            namespaces: [OnceCell::new(), OnceCell::new()],
            listing: OnceCell::new(),
        }
    }
}

/// Lazily built, invalidatable listing of one pack.
pub struct ListingCache {
    source: Arc<dyn PackSource>,
    metadata_suffix: String,
    current: RwLock<Arc<Generation>>,
    next_generation: AtomicU64,
}

impl ListingCache {
    /// Create a cache using the configured metadata suffix.
    ///
    /// Nothing is read from the source until the first query.
    pub fn new(source: Arc<dyn PackSource>) -> Self {
        let suffix = kiln_config::config().listing.metadata_suffix.clone();
        Self::with_metadata_suffix(source, suffix)
    }

    pub fn with_metadata_suffix(source: Arc<dyn PackSource>, metadata_suffix: impl Into<String>) -> Self {
        Self {
            source,
            metadata_suffix: metadata_suffix.into(),
            current: RwLock::new(Arc::new(Generation::new(0))),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Create a cache and register it with the global registry.
    pub fn tracked(source: Arc<dyn PackSource>) -> Arc<Self> {
        let cache = Arc::new(Self::new(source));
        ListingCacheRegistry::global().track(&cache);
        cache
    }

    pub fn source(&self) -> &dyn PackSource {
        self.source.as_ref()
    }

    fn snapshot(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    /// Namespaces under one root, discovered at most once per generation.
    pub fn namespaces(&self, pack_type: PackType) -> Arc<BTreeSet<String>> {
        let generation = self.snapshot();
        self.namespaces_in(&generation, pack_type)
    }

    fn namespaces_in(&self, generation: &Generation, pack_type: PackType) -> Arc<BTreeSet<String>> {
        generation.namespaces[pack_type.index()]
            .get_or_init(|| match self.source.discover_namespaces(pack_type) {
                Ok(found) => Arc::new(found),
                Err(e) => {
                    log_listing_warn!(
                        "Namespace discovery failed",
                        pack = display(self.source.name()),
                        root = display(pack_type),
                        error = display(&e)
                    );
                    Arc::default()
                }
            })
            .clone()
    }

    /// The full listing, built on first use.
    pub fn listing(&self) -> Arc<PackListing> {
        let generation = self.snapshot();
        generation
            .listing
            .get_or_init(|| Arc::new(self.build(&generation)))
            .clone()
    }

    /// Whether `path` (`"{root}/{namespace}/{path}"`, any separator style)
    /// exists in the pack. Metadata files count.
    pub fn exists(&self, path: &str) -> bool {
        self.listing().contains(&normalize_slashes(path))
    }

    /// Enumerate identifiers under `prefix` in one namespace.
    ///
    /// The prefix always matches whole directory names: `"textures"` lists
    /// `textures/...` but not `textures_old/...`. Results follow walk order.
    pub fn list<F>(&self, pack_type: PackType, namespace: &str, prefix: &str, filter: F) -> Vec<AssetId>
    where
        F: Fn(&AssetId) -> bool,
    {
        let mut prefix = normalize_slashes(prefix);
        if !prefix.ends_with(SEPARATOR) {
            prefix.push(SEPARATOR);
        }

        self.collect_ids(pack_type, namespace, |path| path.starts_with(&prefix), filter)
    }

    /// Enumerate every listed identifier of one namespace, in walk order.
    pub fn list_all<F>(&self, pack_type: PackType, namespace: &str, filter: F) -> Vec<AssetId>
    where
        F: Fn(&AssetId) -> bool,
    {
        self.collect_ids(pack_type, namespace, |_| true, filter)
    }

    fn collect_ids<P, F>(&self, pack_type: PackType, namespace: &str, keep_path: P, filter: F) -> Vec<AssetId>
    where
        P: Fn(&str) -> bool,
        F: Fn(&AssetId) -> bool,
    {
        let listing = self.listing();
        listing
            .entries(pack_type, namespace)
            .iter()
            .filter(|entry| keep_path(&entry.normalized))
            .filter_map(|entry| AssetId::new(namespace, entry.normalized.as_str()).ok())
            .filter(|id| filter(id))
            .collect()
    }

    /// Drop every cached result. The next query rebuilds from the source.
    pub fn invalidate(&self) {
        let id = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *self.current.write() = Arc::new(Generation::new(id));
        log_listing_debug!(
            "Listing invalidated",
            pack = display(self.source.name()),
            generation = id
        );
    }

    pub fn is_built(&self) -> bool {
        self.snapshot().listing.get().is_some()
    }

    /// Incremented by every [`invalidate`](Self::invalidate).
    pub fn generation(&self) -> u64 {
        self.snapshot().id
    }

    fn build(&self, generation: &Generation) -> PackListing {
        let started = Instant::now();
        let mut built = PackListing::default();

        for pack_type in PackType::ALL {
            let namespaces = self.namespaces_in(generation, pack_type);
            for namespace in namespaces.iter() {
                let entries = self.index_namespace(pack_type, namespace, &mut built.contained);
                built.listings[pack_type.index()].insert(namespace.clone(), entries);
            }
        }

        log_listing_debug!(
            "Listing built",
            pack = display(self.source.name()),
            generation = generation.id,
            files = built.contained.len(),
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        built
    }

    fn index_namespace(
        &self,
        pack_type: PackType,
        namespace: &str,
        contained: &mut HashSet<String>,
    ) -> Vec<ListedPath> {
        let files = match self.source.walk(pack_type, namespace) {
            Ok(files) => files,
            Err(e) => {
                log_listing_warn!(
                    "Walk failed, namespace treated as empty",
                    pack = display(self.source.name()),
                    root = display(pack_type),
                    namespace = display(namespace),
                    error = display(&e)
                );
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(files.len());
        for relative in files {
            let normalized = match join_components(&relative) {
                Some(p) if !p.is_empty() && is_valid_path(&p) => p,
                _ => continue,
            };

            contained.insert(format!("{}/{}/{}", pack_type.directory(), namespace, normalized));
            if !normalized.ends_with(&self.metadata_suffix) {
                entries.push(ListedPath { relative, normalized });
            }
        }
        entries
    }
}

impl std::fmt::Debug for ListingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingCache")
            .field("pack", &self.source.name())
            .field("generation", &self.generation())
            .field("built", &self.is_built())
            .finish()
    }
}

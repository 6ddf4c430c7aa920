//! Process-wide set of live listing caches.

use std::sync::{Arc, Weak};

use kiln_config::log_listing_debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::ListingCache;

static GLOBAL: Lazy<ListingCacheRegistry> = Lazy::new(ListingCacheRegistry::new);

/// Non-owning registry of [`ListingCache`]s.
///
/// Holds only weak references: a pack dropping its cache is enough to take
/// it out of future broadcasts.
#[derive(Debug, Default)]
pub struct ListingCacheRegistry {
    members: Mutex<Vec<Weak<ListingCache>>>,
}

impl ListingCacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by [`ListingCache::tracked`].
    pub fn global() -> &'static ListingCacheRegistry {
        &GLOBAL
    }

    /// Add `cache` to future broadcasts, dropping entries of dead caches.
    pub fn track(&self, cache: &Arc<ListingCache>) {
        let mut members = self.members.lock();
        members.retain(|weak| weak.strong_count() > 0);
        members.push(Arc::downgrade(cache));
    }

    /// Invalidate every live cache and forget dead ones.
    ///
    /// Returns how many caches were invalidated.
    pub fn invalidate_all(&self) -> usize {
        let live: Vec<Arc<ListingCache>> = {
            let mut members = self.members.lock();
            members.retain(|weak| weak.strong_count() > 0);
            members.iter().filter_map(Weak::upgrade).collect()
        };

        for cache in &live {
            cache.invalidate();
        }

        log_listing_debug!("Invalidated all listing caches", count = live.len());
        live.len()
    }

    /// Caches still alive.
    pub fn live_count(&self) -> usize {
        self.members
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

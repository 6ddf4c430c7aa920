//! # kiln-listing
//!
//! Lazy listing cache for hierarchical content packs.
//!
//! A content pack is a namespaced virtual filesystem:
//!
//! ```text
//! <pack>/
//! ├── assets/<namespace>/...   (PackType::ClientResources)
//! └── data/<namespace>/...     (PackType::ServerData)
//! ```
//!
//! Walking those trees on every existence check or enumeration is what this
//! crate removes. Each pack owns a [`ListingCache`]; the first query builds
//! the whole listing once, later queries read the cached result. The
//! [`ListingCacheRegistry`] fans an invalidation out to every live cache when
//! the host reloads its resources.

mod listing;
mod pack;
mod registry;

pub use listing::{ListedPath, ListingCache, PackListing};
pub use pack::{FsPackSource, PackSource, PackType};
pub use registry::ListingCacheRegistry;

//! # kiln-ids
//!
//! Asset identifiers shared by every Kiln component.
//!
//! An [`AssetId`] is a `(namespace, path)` pair written as `namespace:path`.
//! It is used as a lookup key by the listing cache and as a file-naming
//! component by the migration cache, so both halves are restricted to a
//! small, filesystem-safe alphabet.
//!
//! Paths are always stored with `/` as the separator. Anything that comes
//! from a directory walk goes through [`normalize_slashes`] or
//! [`join_components`] first so results do not depend on the host's path
//! convention.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace assumed when an identifier string has no `namespace:` prefix.
pub const DEFAULT_NAMESPACE: &str = "kiln";

/// Canonical path separator inside identifiers and listings.
pub const SEPARATOR: char = '/';

/// Errors produced while parsing or validating identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid character {ch:?} in namespace {namespace:?}")]
    InvalidNamespace { namespace: String, ch: char },

    #[error("invalid character {ch:?} in path {path:?}")]
    InvalidPath { path: String, ch: char },

    #[error("empty path in identifier")]
    EmptyPath,
}

/// Characters allowed in the path half of an identifier.
#[inline]
pub fn is_valid_path_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/')
}

/// Characters allowed in the namespace half of an identifier.
#[inline]
pub fn is_valid_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.')
}

pub fn is_valid_path(path: &str) -> bool {
    path.chars().all(is_valid_path_char)
}

pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.chars().all(is_valid_namespace_char)
}

/// Logical asset identifier: `namespace:path`.
///
/// Immutable once constructed. Ordering is namespace first, then path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId {
    namespace: String,
    path: String,
}

impl AssetId {
    /// Build an identifier, validating both halves.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self, IdError> {
        let namespace = namespace.into();
        let path = path.into();

        if let Some(ch) = namespace.chars().find(|c| !is_valid_namespace_char(*c)) {
            return Err(IdError::InvalidNamespace { namespace, ch });
        }
        if path.is_empty() {
            return Err(IdError::EmptyPath);
        }
        if let Some(ch) = path.chars().find(|c| !is_valid_path_char(*c)) {
            return Err(IdError::InvalidPath { path, ch });
        }

        Ok(Self { namespace, path })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flatten the path for use inside a single file name (`a/b` -> `a_b`).
    pub fn flattened_path(&self) -> String {
        self.path.replace(SEPARATOR, "_")
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for AssetId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ns, path)) if !ns.is_empty() => AssetId::new(ns, path),
            Some((_, path)) => AssetId::new(DEFAULT_NAMESPACE, path),
            None => AssetId::new(DEFAULT_NAMESPACE, s),
        }
    }
}

/// Normalize a slash-separated path string.
///
/// Backslashes become `/`, runs of separators collapse to one, and leading
/// `./` or `/` segments are dropped. A trailing separator is kept.
pub fn normalize_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_sep = true; // swallow leading separators
    let mut segment_start = 0;

    for c in path.chars() {
        let c = if c == '\\' { SEPARATOR } else { c };
        if c == SEPARATOR {
            if last_was_sep {
                continue;
            }
            // Drop "." segments
            if &out[segment_start..] == "." {
                out.truncate(segment_start);
                last_was_sep = true;
                continue;
            }
            out.push(SEPARATOR);
            last_was_sep = true;
            segment_start = out.len();
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }

    out
}

/// Join the components of a relative path with `/`.
///
/// Each component is further split on `\` so a path produced under a
/// Windows-style walker (`a\b\c`) yields the same string as `a/b/c`.
/// Returns `None` for non-UTF-8 paths and for paths escaping their root.
pub fn join_components(path: &Path) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(os) => {
                let s = os.to_str()?;
                parts.extend(s.split('\\').filter(|p| !p.is_empty()));
            }
            Component::CurDir => {}
            Component::ParentDir => return None,
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts.join("/"))
}

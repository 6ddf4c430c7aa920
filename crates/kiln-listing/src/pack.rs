//! Raw pack primitives: namespace discovery and directory walks.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_config::log_listing_warn;
use kiln_ids::is_valid_namespace;
use walkdir::WalkDir;

/// Logical root of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackType {
    /// `assets/`
    ClientResources,
    /// `data/`
    ServerData,
}

impl PackType {
    pub const ALL: [PackType; 2] = [PackType::ClientResources, PackType::ServerData];

    /// Top-level directory name inside a pack.
    pub fn directory(self) -> &'static str {
        match self {
            PackType::ClientResources => "assets",
            PackType::ServerData => "data",
        }
    }

    pub fn from_directory(dir: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.directory() == dir)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            PackType::ClientResources => 0,
            PackType::ServerData => 1,
        }
    }
}

impl fmt::Display for PackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory())
    }
}

/// The expensive operations a [`crate::ListingCache`] sits in front of.
///
/// Both may fail with I/O errors; the cache degrades those to empty results.
pub trait PackSource: Send + Sync {
    /// Human-readable pack name for logs
    fn name(&self) -> &str;

    /// Namespaces present under the given root.
    fn discover_namespaces(&self, pack_type: PackType) -> io::Result<BTreeSet<String>>;

    /// Every file below `<root>/<namespace>`, relative to that directory, in
    /// a deterministic order. Separators follow the host convention.
    fn walk(&self, pack_type: PackType, namespace: &str) -> io::Result<Vec<PathBuf>>;
}

/// Directory-backed pack
#[derive(Debug, Clone)]
pub struct FsPackSource {
    name: String,
    root: PathBuf,
}

impl FsPackSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { name, root }
    }

    pub fn with_name(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, pack_type: PackType, namespace: &str) -> PathBuf {
        self.root.join(pack_type.directory()).join(namespace)
    }
}

impl PackSource for FsPackSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover_namespaces(&self, pack_type: PackType) -> io::Result<BTreeSet<String>> {
        let type_root = self.root.join(pack_type.directory());
        let entries = match fs::read_dir(&type_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e),
        };

        let mut namespaces = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_valid_namespace(&name) {
                namespaces.insert(name);
            } else {
                log_listing_warn!(
                    "Ignoring invalid namespace directory",
                    pack = display(&self.name),
                    namespace = display(&name)
                );
            }
        }
        Ok(namespaces)
    }

    fn walk(&self, pack_type: PackType, namespace: &str) -> io::Result<Vec<PathBuf>> {
        let base = self.resolve(pack_type, namespace);
        let mut files = Vec::new();

        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&base) {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_pack_type_directories() {
        assert_eq!(PackType::ClientResources.directory(), "assets");
        assert_eq!(PackType::from_directory("data"), Some(PackType::ServerData));
        assert_eq!(PackType::from_directory("other"), None);
    }

    #[test]
    fn test_discover_namespaces_filters_invalid() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "assets/alpha/a.json");
        touch(temp.path(), "assets/Bad Name/a.json");
        touch(temp.path(), "assets/stray_file.txt");

        let pack = FsPackSource::new(temp.path());
        let namespaces = pack.discover_namespaces(PackType::ClientResources).unwrap();
        assert_eq!(namespaces.into_iter().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let pack = FsPackSource::new(temp.path());
        assert!(pack.discover_namespaces(PackType::ServerData).unwrap().is_empty());
    }

    #[test]
    fn test_walk_is_sorted_and_relative() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "data/ns/b/two.json");
        touch(temp.path(), "data/ns/a.json");
        touch(temp.path(), "data/ns/b/one.json");

        let pack = FsPackSource::new(temp.path());
        let files = pack.walk(PackType::ServerData, "ns").unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.json"),
                PathBuf::from("b/one.json"),
                PathBuf::from("b/two.json"),
            ]
        );
    }

    #[test]
    fn test_walk_missing_namespace_errors() {
        let temp = TempDir::new().unwrap();
        let pack = FsPackSource::new(temp.path());
        assert!(pack.walk(PackType::ServerData, "absent").is_err());
    }
}

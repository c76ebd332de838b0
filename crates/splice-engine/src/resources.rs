//! Package and resource identity, plus the stores that read resource text.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ResourceError;

/// Identifier of a package-resources bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(String);

impl PackageId {
    /// Creates an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A bucket of resources belonging to one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResources {
    id: PackageId,
    default_target_path: String,
    root: Option<Utf8PathBuf>,
    local: bool,
}

impl PackageResources {
    /// Creates a stable bucket whose items install under
    /// `default_target_path`.
    #[must_use]
    pub fn stable(id: impl Into<PackageId>, default_target_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_target_path: default_target_path.into(),
            root: None,
            local: false,
        }
    }

    /// Creates a local (watched, mutable) bucket.
    #[must_use]
    pub fn local(id: impl Into<PackageId>, default_target_path: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::stable(id, default_target_path)
        }
    }

    /// Sets the directory the bucket's resources are read from.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// The package id.
    #[must_use]
    pub const fn id(&self) -> &PackageId {
        &self.id
    }

    /// Prefix of every item target path in this bucket.
    #[must_use]
    pub fn default_target_path(&self) -> &str {
        &self.default_target_path
    }

    /// Directory backing the bucket, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    /// Returns `true` for watched, mutable buckets.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.local
    }

    /// Final target path of a resource in this bucket.
    #[must_use]
    pub fn target_path_of(&self, locator: &ResourceLocator) -> String {
        let prefix = self.default_target_path.trim_matches('/');
        let name = locator.full_resource_name.trim_start_matches('/');
        if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}/{name}")
        }
    }

    /// Absolute path of a resource, for local buckets with a root.
    #[must_use]
    pub fn full_path_of(&self, locator: &ResourceLocator) -> Option<Utf8PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(&locator.full_resource_name))
    }
}

/// Identity of one resource within its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceLocator {
    full_resource_name: String,
    resource_name: String,
}

impl ResourceLocator {
    /// Creates a locator from a `/`-separated path relative to the bucket.
    #[must_use]
    pub fn new(full_resource_name: impl Into<String>) -> Self {
        let full: String = full_resource_name.into();
        let full_resource_name = full.replace('\\', "/").trim_start_matches('/').to_owned();
        let resource_name = full_resource_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        Self {
            full_resource_name,
            resource_name,
        }
    }

    /// Path relative to the bucket, for example `pages/home.ts`.
    #[must_use]
    pub fn full_resource_name(&self) -> &str {
        &self.full_resource_name
    }

    /// File name, for example `home.ts`.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Directory part of the full name (empty at the bucket root).
    #[must_use]
    pub fn directory(&self) -> &str {
        self.full_resource_name
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_resource_name)
    }
}

/// Reads resource text from some backing storage.
pub trait ResourceStore: Send + Sync {
    /// Lists the resources of a bucket in a stable order.
    ///
    /// # Errors
    ///
    /// Fails when the bucket's storage cannot be enumerated.
    fn list(&self, package: &PackageResources) -> Result<Vec<ResourceLocator>, ResourceError>;

    /// Reads one resource.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NotFound`] when the resource does not exist.
    fn read(
        &self,
        package: &PackageResources,
        locator: &ResourceLocator,
    ) -> Result<String, ResourceError>;
}

/// In-memory store, mutable through a shared reference.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    files: RwLock<BTreeMap<PackageId, BTreeMap<String, String>>>,
}

impl MemoryResourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a resource.
    pub fn insert(&self, package: &PackageId, path: &str, text: impl Into<String>) {
        let locator = ResourceLocator::new(path);
        let mut files = self.files.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        files
            .entry(package.clone())
            .or_default()
            .insert(locator.full_resource_name, text.into());
    }

    /// Removes a resource, returning `true` if it existed.
    pub fn remove(&self, package: &PackageId, path: &str) -> bool {
        let locator = ResourceLocator::new(path);
        let mut files = self.files.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        files
            .get_mut(package)
            .and_then(|bucket| bucket.remove(&locator.full_resource_name))
            .is_some()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn list(&self, package: &PackageResources) -> Result<Vec<ResourceLocator>, ResourceError> {
        let files = self.files.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(files
            .get(package.id())
            .map(|bucket| bucket.keys().map(ResourceLocator::new).collect())
            .unwrap_or_default())
    }

    fn read(
        &self,
        package: &PackageResources,
        locator: &ResourceLocator,
    ) -> Result<String, ResourceError> {
        let files = self.files.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        files
            .get(package.id())
            .and_then(|bucket| bucket.get(locator.full_resource_name()))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                package: package.id().clone(),
                resource: locator.full_resource_name().to_owned(),
            })
    }
}

/// Store reading each bucket from its root directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemResourceStore;

impl FileSystemResourceStore {
    /// Creates the store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn root_of(package: &PackageResources) -> Result<&Utf8Path, ResourceError> {
        package.root().ok_or_else(|| ResourceError::NoRoot {
            package: package.id().clone(),
        })
    }

    fn walk(
        root: &Utf8Path,
        dir: &Utf8Path,
        out: &mut Vec<ResourceLocator>,
    ) -> Result<(), ResourceError> {
        let entries = fs::read_dir(dir).map_err(|e| ResourceError::io(dir, &e))?;
        for listed in entries {
            let entry = listed.map_err(|e| ResourceError::io(dir, &e))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.file_name().is_some_and(|name| name.starts_with('.')) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| ResourceError::io(&path, &e))?;
            if file_type.is_dir() {
                Self::walk(root, &path, out)?;
            } else if let Ok(relative) = path.strip_prefix(root) {
                out.push(ResourceLocator::new(relative.as_str()));
            }
        }
        Ok(())
    }
}

impl ResourceStore for FileSystemResourceStore {
    fn list(&self, package: &PackageResources) -> Result<Vec<ResourceLocator>, ResourceError> {
        let root = Self::root_of(package)?;
        let mut out = Vec::new();
        Self::walk(root, root, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn read(
        &self,
        package: &PackageResources,
        locator: &ResourceLocator,
    ) -> Result<String, ResourceError> {
        let path = Self::root_of(package)?.join(locator.full_resource_name());
        fs::read_to_string(&path).map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ResourceError::NotFound {
                    package: package.id().clone(),
                    resource: locator.full_resource_name().to_owned(),
                }
            } else {
                ResourceError::io(path, &error)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("pages/home.ts", "home.ts", "pages")]
    #[case("/home.ts", "home.ts", "")]
    #[case("a\\b\\c.rs", "c.rs", "a/b")]
    fn locators_split_paths(#[case] input: &str, #[case] name: &str, #[case] dir: &str) {
        let locator = ResourceLocator::new(input);
        assert_eq!(locator.resource_name(), name);
        assert_eq!(locator.directory(), dir);
    }

    #[rstest]
    #[case("app/", "pages/home.ts", "app/pages/home.ts")]
    #[case("", "home.ts", "home.ts")]
    fn target_paths_join_prefix(#[case] prefix: &str, #[case] path: &str, #[case] expected: &str) {
        let package = PackageResources::stable("core", prefix);
        assert_eq!(package.target_path_of(&ResourceLocator::new(path)), expected);
    }

    #[test]
    fn memory_store_lists_sorted_and_reports_missing() {
        let store = MemoryResourceStore::new();
        let package = PackageResources::local("app", "app");
        store.insert(package.id(), "z.ts", "z");
        store.insert(package.id(), "a/b.ts", "b");

        let names: Vec<_> = store
            .list(&package)
            .expect("list")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["a/b.ts", "z.ts"]);

        assert!(store.remove(package.id(), "z.ts"));
        let missing = store
            .read(&package, &ResourceLocator::new("z.ts"))
            .expect_err("removed");
        assert!(matches!(missing, ResourceError::NotFound { .. }));
    }

    #[test]
    fn file_system_store_walks_the_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8");
        fs::create_dir_all(root.join("pages")).expect("mkdir");
        fs::write(root.join("pages/home.ts"), "let a = 1;").expect("write");
        fs::write(root.join("home.t"), "").expect("write");
        fs::write(root.join(".hidden"), "").expect("write");

        let package = PackageResources::local("app", "app").with_root(root);
        let store = FileSystemResourceStore::new();
        let names: Vec<_> = store
            .list(&package)
            .expect("list")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["home.t", "pages/home.ts"]);
        assert_eq!(
            store
                .read(&package, &ResourceLocator::new("pages/home.ts"))
                .expect("read"),
            "let a = 1;"
        );
    }
}

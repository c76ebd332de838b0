//! Writing transformed items to their final location.

use std::io::Write;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use splice_config::Config;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::InstallError;

/// Transformed text of one item, ready to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallableItem {
    /// Final target path, relative to the install root.
    pub target_path: String,
    /// Text after every chained function has been applied.
    pub text: String,
}

/// Publishes installable items somewhere.
pub trait Installer {
    /// Installs one item.
    ///
    /// # Errors
    ///
    /// Fails when the item cannot be written.
    fn install(&self, item: &InstallableItem) -> Result<(), InstallError>;

    /// Installs every item, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    fn install_all(&self, items: &[InstallableItem]) -> Result<(), InstallError> {
        items.iter().try_for_each(|item| self.install(item))
    }
}

/// Writes items below a root directory, replacing each file atomically.
#[derive(Debug, Clone)]
pub struct FileSystemInstaller {
    root: Utf8PathBuf,
}

impl FileSystemInstaller {
    /// Installs below `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Installs below the configured target root, if any.
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        config.install.target_root.clone().map(Self::new)
    }

    /// The install root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn destination(&self, target_path: &str) -> Result<Utf8PathBuf, InstallError> {
        let relative = Utf8Path::new(target_path);
        let escapes = relative.as_str().is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Utf8Component::Normal(_)));
        if escapes {
            return Err(InstallError::InvalidTargetPath {
                path: target_path.to_owned(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl Installer for FileSystemInstaller {
    fn install(&self, item: &InstallableItem) -> Result<(), InstallError> {
        let destination = self.destination(&item.target_path)?;
        let parent = destination.parent().unwrap_or(&self.root);
        let write_error = |source| InstallError::Write {
            path: destination.clone(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(write_error)?;
        let mut file = NamedTempFile::new_in(parent).map_err(write_error)?;
        file.write_all(item.text.as_bytes()).map_err(write_error)?;
        file.persist(&destination)
            .map_err(|error| write_error(error.error))?;
        debug!(
            target: "splice::install",
            path = %destination,
            bytes = item.text.len(),
            "installed item"
        );
        Ok(())
    }
}

//! Package lookup through the ament resource index
//!
//! A package is installed under a prefix when the marker file
//! `<prefix>/share/ament_index/resource_index/packages/<package>` exists.
//! Prefixes are searched in `AMENT_PREFIX_PATH` order, so overlays win.

use std::path::{Path, PathBuf};

const PACKAGES_RESOURCE: &str = "share/ament_index/resource_index/packages";

/// Ordered set of install prefixes to search for packages
#[derive(Debug, Clone, Default)]
pub struct AmentIndex {
    prefixes: Vec<PathBuf>,
}

impl AmentIndex {
    /// Build the index from `AMENT_PREFIX_PATH`
    pub fn from_env() -> Self {
        let prefixes = std::env::var_os("AMENT_PREFIX_PATH")
            .map(|paths| {
                std::env::split_paths(&paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self { prefixes }
    }

    /// Build the index from an explicit list of prefixes
    pub fn from_prefixes<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// Find the first prefix that registers `package`
    pub fn package_prefix(&self, package: &str) -> Result<&Path, AmentError> {
        self.prefixes
            .iter()
            .find(|prefix| prefix.join(PACKAGES_RESOURCE).join(package).is_file())
            .map(PathBuf::as_path)
            .ok_or_else(|| AmentError::PackageNotFound(package.to_string()))
    }

    /// `<prefix>/share/<package>`
    pub fn share_dir(&self, package: &str) -> Result<PathBuf, AmentError> {
        Ok(self.package_prefix(package)?.join("share").join(package))
    }

    /// `<prefix>/lib/<package>/<executable>`, the location `ros2 run` uses
    pub fn executable(&self, package: &str, executable: &str) -> Result<PathBuf, AmentError> {
        let path = self
            .package_prefix(package)?
            .join("lib")
            .join(package)
            .join(executable);

        if path.is_file() {
            Ok(path)
        } else {
            Err(AmentError::ExecutableNotFound {
                package: package.to_string(),
                executable: executable.to_string(),
            })
        }
    }
}

/// Errors raised while looking up packages
#[derive(Debug, thiserror::Error)]
pub enum AmentError {
    #[error("Package '{0}' not found in AMENT_PREFIX_PATH")]
    PackageNotFound(String),

    #[error("Executable '{executable}' not found in package '{package}'")]
    ExecutableNotFound { package: String, executable: String },
}

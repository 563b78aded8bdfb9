//! Cross-Platform Path Utilities
//!
//! Resolves the tool's home layout (`~/.fef/...`). Everything hangs off a
//! `FeflowPaths` value so tests can point it at a temporary directory.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Name of the tool's home directory under the user's home.
pub const FEFLOW_ROOT: &str = ".fef";
/// Package name of the tool itself, as published on the registry.
pub const CLI_PACKAGE_NAME: &str = "@feflow/cli";
pub const CONFIG_FILE: &str = ".feflowrc.yml";
pub const MANIFEST_FILE: &str = "package.json";
pub const UNIVERSAL_MANIFEST_FILE: &str = "universal-package.json";
pub const UNIVERSAL_MODULES_DIR: &str = "universal_modules";
pub const NODE_MODULES_DIR: &str = "node_modules";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Layout of the tool's home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeflowPaths {
    root: PathBuf,
}

impl FeflowPaths {
    /// `~/.fef` under the current user's home.
    pub fn discover() -> AppResult<Self> {
        Ok(Self::from_home(&home_dir()?))
    }

    /// `<home>/.fef`.
    pub fn from_home(home: &Path) -> Self {
        Self {
            root: home.join(FEFLOW_ROOT),
        }
    }

    /// Use `root` directly as the tool home.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// `.feflowrc.yml` holding packageManager, lastUpdateCheck, ...
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// `package.json` listing installed ecosystem plugins.
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn node_modules(&self) -> PathBuf {
        self.root.join(NODE_MODULES_DIR)
    }

    /// Install directory of one ecosystem plugin (handles `@scope/name`).
    pub fn plugin_dir(&self, package: &str) -> PathBuf {
        package
            .split('/')
            .fold(self.node_modules(), |dir, part| dir.join(part))
    }

    pub fn universal_manifest_file(&self) -> PathBuf {
        self.root.join(UNIVERSAL_MANIFEST_FILE)
    }

    pub fn universal_modules(&self) -> PathBuf {
        self.root.join(UNIVERSAL_MODULES_DIR)
    }

    /// `universal_modules/<name>@<version>`.
    pub fn universal_package_dir(&self, package: &str, version: &str) -> PathBuf {
        self.universal_modules()
            .join(format!("{}@{}", package, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_home() {
        let paths = FeflowPaths::from_home(Path::new("/home/u"));
        assert_eq!(paths.root(), Path::new("/home/u/.fef"));
        assert_eq!(paths.config_file(), PathBuf::from("/home/u/.fef/.feflowrc.yml"));
        assert_eq!(paths.manifest_file(), PathBuf::from("/home/u/.fef/package.json"));
        assert_eq!(paths.bin_dir(), PathBuf::from("/home/u/.fef/bin"));
    }

    #[test]
    fn test_scoped_plugin_dir() {
        let paths = FeflowPaths::from_root("/r");
        assert_eq!(
            paths.plugin_dir("@tencent/feflow-plugin-x"),
            PathBuf::from("/r/node_modules/@tencent/feflow-plugin-x")
        );
        assert_eq!(
            paths.plugin_dir("feflow-plugin-y"),
            PathBuf::from("/r/node_modules/feflow-plugin-y")
        );
    }

    #[test]
    fn test_universal_package_dir() {
        let paths = FeflowPaths::from_root("/r");
        assert_eq!(
            paths.universal_package_dir("feflow-plugin-z", "1.2.0"),
            PathBuf::from("/r/universal_modules/feflow-plugin-z@1.2.0")
        );
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}

//! Home Bootstrap
//!
//! Makes sure `~/.fef` has the layout every other component assumes.

use crate::storage::manifest::default_manifest;
use crate::utils::error::AppResult;
use crate::utils::paths::{ensure_dir, FeflowPaths};

/// Create the home directory, `bin/`, `lib/` and a minimal dependency
/// manifest when they are missing. A plain file sitting where the home
/// directory should be is removed first.
pub fn ensure_home(paths: &FeflowPaths) -> AppResult<()> {
    let root = paths.root();
    if root.is_file() {
        tracing::warn!("[bootstrap] Replacing file at {}", root.display());
        std::fs::remove_file(root)?;
    }

    ensure_dir(root)?;
    ensure_dir(&paths.bin_dir())?;
    ensure_dir(&paths.lib_dir())?;

    let manifest = paths.manifest_file();
    if !manifest.exists() {
        let body = serde_json::to_string_pretty(&default_manifest())?;
        std::fs::write(&manifest, body)?;
        tracing::debug!("[bootstrap] Created {}", manifest.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_layout_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = FeflowPaths::from_home(tmp.path());

        ensure_home(&paths).unwrap();

        assert!(paths.bin_dir().is_dir());
        assert!(paths.lib_dir().is_dir());
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.manifest_file()).unwrap()).unwrap();
        assert_eq!(manifest["name"], "feflow-home");
    }

    #[test]
    fn test_existing_manifest_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = FeflowPaths::from_root(tmp.path());
        std::fs::write(paths.manifest_file(), r#"{"dependencies":{"a":"1"}}"#).unwrap();

        ensure_home(&paths).unwrap();

        let body = std::fs::read_to_string(paths.manifest_file()).unwrap();
        assert!(body.contains("\"a\""));
    }

    #[test]
    fn test_file_at_root_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".fef");
        std::fs::write(&root, "oops").unwrap();

        ensure_home(&FeflowPaths::from_root(&root)).unwrap();

        assert!(root.is_dir());
    }
}

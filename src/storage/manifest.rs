//! Dependency Manifest
//!
//! `~/.fef/package.json` records which ecosystem plugins are installed. Only
//! `dependencies` and `devDependencies` are interpreted; the rest of the
//! document is preserved when versions are rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::services::naming::is_managed_package;
use crate::utils::error::AppResult;

const DEPENDENCY_KEYS: [&str; 2] = ["dependencies", "devDependencies"];

/// Body written when the home directory is bootstrapped.
pub fn default_manifest() -> Value {
    json!({
        "name": "feflow-home",
        "version": "0.0.0",
        "private": true
    })
}

#[derive(Debug, Clone)]
pub struct DependencyManifest {
    path: PathBuf,
    document: Value,
}

impl DependencyManifest {
    /// Load the manifest. Missing or malformed files read as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(value) if value.is_object() => value,
                Ok(_) => {
                    tracing::warn!("[manifest] {} is not a JSON object", path.display());
                    Value::Object(Map::new())
                }
                Err(e) => {
                    tracing::warn!("[manifest] Failed to parse {}: {}", path.display(), e);
                    Value::Object(Map::new())
                }
            },
            Err(_) => Value::Object(Map::new()),
        };
        Self { path, document }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All declared dependencies (`devDependencies` win on duplicates),
    /// name → version range.
    pub fn dependencies(&self) -> BTreeMap<String, String> {
        let mut deps = BTreeMap::new();
        for key in DEPENDENCY_KEYS {
            if let Some(section) = self.document.get(key).and_then(Value::as_object) {
                for (name, version) in section {
                    let version = version.as_str().unwrap_or_default().to_string();
                    deps.insert(name.clone(), version);
                }
            }
        }
        deps
    }

    /// Dependencies matching the plugin/generator naming convention.
    pub fn managed_packages(&self) -> Vec<String> {
        self.dependencies()
            .into_keys()
            .filter(|name| is_managed_package(name))
            .collect()
    }

    pub fn version_of(&self, name: &str) -> Option<String> {
        DEPENDENCY_KEYS.iter().rev().find_map(|key| {
            self.document
                .get(*key)
                .and_then(|section| section.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Rewrite the version of `name` wherever it is declared. A package not
    /// yet declared is added to `dependencies`.
    pub fn set_version(&mut self, name: &str, version: &str) {
        let Some(root) = self.document.as_object_mut() else {
            return;
        };

        let mut found = false;
        for key in DEPENDENCY_KEYS {
            if let Some(section) = root.get_mut(key).and_then(Value::as_object_mut) {
                if let Some(slot) = section.get_mut(name) {
                    *slot = Value::String(version.to_string());
                    found = true;
                }
            }
        }

        if !found {
            let section = root
                .entry("dependencies")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(section) = section.as_object_mut() {
                section.insert(name.to_string(), Value::String(version.to_string()));
            }
        }
    }

    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.document)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

//! Universal Package Loader
//!
//! Universal packages are language-agnostic plugins managed by the tool
//! itself. `~/.fef/universal-package.json` records what is installed:
//!
//! ```json
//! { "name": "universal-package", "dependencies": { "feflow-plugin-go-lint": "1.2.0" } }
//! ```
//!
//! and each package lives in `~/.fef/universal_modules/<name>@<version>/`
//! with a `plugin.yml`:
//!
//! ```yaml
//! desc: Lint Go sources
//! command:
//!   default: ./bin/lint
//!   windows: bin\lint.exe
//! usage:
//!   options:
//!     - name: fix
//!       desc: Apply fixes
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use feflow_core::plugin::install;
use feflow_core::{
    CommandRegistry, CommandSource, CommandUsage, CoreError, CoreResult, OptionSpec, Plugin,
    PluginContext,
};
use serde::Deserialize;

use super::process::ProcessCommand;
use super::SourceLoader;
use crate::services::naming::command_name_from_package;
use crate::services::picker::LoadOrder;
use crate::utils::error::AppResult;
use crate::utils::paths::FeflowPaths;

pub const PLUGIN_CONFIG_FILE: &str = "plugin.yml";

#[derive(Debug, Clone, Default, Deserialize)]
struct UniversalManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

/// Command line per platform; `default` applies when no override matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformCommand {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub linux: Option<String>,
    #[serde(default, alias = "darwin")]
    pub macos: Option<String>,
    #[serde(default, alias = "win32")]
    pub windows: Option<String>,
}

impl PlatformCommand {
    /// The command line for the running platform.
    pub fn for_current_platform(&self) -> Option<&str> {
        let specific = match std::env::consts::OS {
            "linux" => self.linux.as_deref(),
            "macos" => self.macos.as_deref(),
            "windows" => self.windows.as_deref(),
            _ => None,
        };
        specific.or(self.default.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageSection {
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

/// Contents of `plugin.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UniversalPluginConfig {
    #[serde(default, alias = "description")]
    pub desc: String,
    pub command: PlatformCommand,
    #[serde(default)]
    pub usage: UsageSection,
}

/// One installed universal package.
#[derive(Debug, Clone)]
pub struct UniversalPackage {
    package: String,
    version: String,
    dir: PathBuf,
    config: UniversalPluginConfig,
}

impl UniversalPackage {
    pub fn read(package: &str, version: &str, dir: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(dir.join(PLUGIN_CONFIG_FILE))?;
        let config: UniversalPluginConfig = serde_yaml::from_str(&content)?;
        Ok(Self {
            package: package.to_string(),
            version: version.to_string(),
            dir: dir.to_path_buf(),
            config,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn command_name(&self) -> &str {
        command_name_from_package(&self.package)
    }
}

impl Plugin for UniversalPackage {
    fn name(&self) -> &str {
        &self.package
    }

    fn register(&self, ctx: &mut PluginContext<'_>) -> CoreResult<()> {
        let line = self.config.command.for_current_platform().ok_or_else(|| {
            CoreError::validation(format!(
                "{}@{} has no command for {}",
                self.package,
                self.version,
                std::env::consts::OS
            ))
        })?;

        let handler = ProcessCommand::shell(line).with_working_dir(&self.dir);
        let mut usage = CommandUsage::new(self.config.desc.clone());
        usage.options = self.config.usage.options.clone();

        let descriptor = ctx
            .command(self.command_name(), Arc::new(handler))
            .with_usage(usage);
        ctx.register(descriptor);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UniversalLoader {
    paths: FeflowPaths,
}

impl UniversalLoader {
    pub fn new(paths: FeflowPaths) -> Self {
        Self { paths }
    }

    /// `(name, version)` pairs recorded as installed. A missing or malformed
    /// record means nothing is installed.
    pub fn installed(&self) -> Vec<(String, String)> {
        let path = self.paths.universal_manifest_file();
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        match serde_json::from_str::<UniversalManifest>(&content) {
            Ok(manifest) => manifest.dependencies.into_iter().collect(),
            Err(e) => {
                tracing::warn!("[universal] Failed to parse {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn discover(&self) -> Vec<UniversalPackage> {
        self.installed()
            .into_iter()
            .filter_map(|(name, version)| {
                let dir = self.paths.universal_package_dir(&name, &version);
                match UniversalPackage::read(&name, &version, &dir) {
                    Ok(package) => Some(package),
                    Err(e) => {
                        tracing::warn!("[universal] Plugin load failed: {}@{}: {}", name, version, e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceLoader for UniversalLoader {
    fn name(&self) -> &'static str {
        "universal"
    }

    fn flag(&self) -> LoadOrder {
        LoadOrder::UNIVERSAL
    }

    /// Names come straight from the install record; no package is opened.
    fn declared_names(&self) -> Vec<String> {
        self.installed()
            .into_iter()
            .map(|(name, _)| command_name_from_package(&name).to_string())
            .collect()
    }

    async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize> {
        let mut total = 0;
        for package in self.discover() {
            match install(&package, registry, CommandSource::Universal) {
                Ok(count) => total += count,
                Err(e) => tracing::warn!("[universal] Plugin load failed: {}: {}", package.name(), e),
            }
        }
        Ok(total)
    }
}

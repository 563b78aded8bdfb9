//! Ecosystem Plugin Loader
//!
//! Plugins are packages installed into `~/.fef/node_modules` and listed in the
//! home `package.json`. Each declares its commands in its own `package.json`:
//!
//! ```json
//! {
//!   "name": "feflow-plugin-deploy",
//!   "bin": "./bin/deploy",
//!   "feflow": {
//!     "commands": [
//!       { "name": "deploy", "desc": "Deploy the project", "bin": "./bin/deploy",
//!         "aliases": ["d"], "options": [{ "name": "env", "alias": "e", "desc": "Target" }] }
//!     ]
//!   }
//! }
//! ```
//!
//! A plugin without `feflow.commands` but with a single string `bin`
//! contributes one command named after its package suffix.

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
use super::{plugin_name_patterns, SourceLoader};
use crate::services::naming::command_name_from_package;
use crate::services::picker::LoadOrder;
use crate::storage::DependencyManifest;
use crate::utils::error::AppResult;
use crate::utils::paths::{FeflowPaths, MANIFEST_FILE};

/// `bin` is either one path or a map of executable name → path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinField {
    Single(String),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredCommand {
    pub name: String,
    #[serde(default, alias = "description")]
    pub desc: String,
    #[serde(default)]
    pub bin: Option<String>,
    /// Fixed arguments placed before the user's.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeflowSection {
    #[serde(default)]
    pub commands: Vec<DeclaredCommand>,
}

/// The parts of a plugin's `package.json` this tool reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginPackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bin: Option<BinField>,
    #[serde(default)]
    pub feflow: Option<FeflowSection>,
}

/// One installed ecosystem plugin.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    package: String,
    dir: PathBuf,
    manifest: PluginPackageJson,
}

impl ManifestPlugin {
    /// Read `<dir>/package.json`.
    pub fn read(package: &str, dir: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
        let manifest: PluginPackageJson = serde_json::from_str(&content)?;
        Ok(Self {
            package: package.to_string(),
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest.version.as_deref()
    }

    /// Commands as declared, or the single-bin fallback.
    pub fn commands(&self) -> Vec<DeclaredCommand> {
        if let Some(section) = &self.manifest.feflow {
            if !section.commands.is_empty() {
                return section.commands.clone();
            }
        }
        match &self.manifest.bin {
            Some(BinField::Single(path)) => vec![DeclaredCommand {
                name: command_name_from_package(&self.package).to_string(),
                desc: self.manifest.description.clone().unwrap_or_default(),
                bin: Some(path.clone()),
                args: Vec::new(),
                options: Vec::new(),
                aliases: Vec::new(),
            }],
            _ => Vec::new(),
        }
    }

    /// Names (and aliases) the plugin would register.
    pub fn command_names(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .flat_map(|c| std::iter::once(c.name).chain(c.aliases))
            .collect()
    }

    fn resolve_bin(&self, command: &DeclaredCommand) -> Option<PathBuf> {
        let relative = command.bin.clone().or_else(|| match &self.manifest.bin {
            Some(BinField::Single(path)) => Some(path.clone()),
            Some(BinField::Map(map)) => map
                .get(&command.name)
                .or_else(|| map.values().next())
                .cloned(),
            None => None,
        })?;
        Some(self.dir.join(relative))
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.package
    }

    fn register(&self, ctx: &mut PluginContext<'_>) -> CoreResult<()> {
        let commands = self.commands();
        if commands.is_empty() {
            return Err(CoreError::validation(format!(
                "{} declares no commands",
                self.package
            )));
        }

        for command in commands {
            let Some(bin) = self.resolve_bin(&command) else {
                tracing::warn!(
                    "[plugin] {}: command '{}' has no executable, skipped",
                    self.package,
                    command.name
                );
                continue;
            };

            let handler = ProcessCommand::exec(bin).with_args(command.args.clone());
            let mut usage = CommandUsage::new(command.desc.clone());
            usage.options = command.options.clone();

            let descriptor = ctx
                .command(command.name.clone(), Arc::new(handler))
                .with_usage(usage)
                .with_aliases(command.aliases.clone());
            ctx.register(descriptor);
        }
        Ok(())
    }
}

/// Loads every installed ecosystem plugin.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    paths: FeflowPaths,
}

impl PluginLoader {
    pub fn new(paths: FeflowPaths) -> Self {
        Self { paths }
    }

    /// Managed packages from the manifest that are actually installed.
    pub fn installed_packages(&self) -> Vec<String> {
        DependencyManifest::load(self.paths.manifest_file())
            .managed_packages()
            .into_iter()
            .filter(|name| self.paths.plugin_dir(name).is_dir())
            .collect()
    }

    /// Installed plugins whose manifest could be read. Unreadable ones are
    /// logged and left out.
    pub fn discover(&self) -> Vec<ManifestPlugin> {
        self.installed_packages()
            .into_iter()
            .filter_map(|name| {
                let dir = self.paths.plugin_dir(&name);
                match ManifestPlugin::read(&name, &dir) {
                    Ok(plugin) => Some(plugin),
                    Err(e) => {
                        tracing::warn!("[plugin] Plugin load failed: {}: {}", name, e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceLoader for PluginLoader {
    fn name(&self) -> &'static str {
        "plugin"
    }

    fn flag(&self) -> LoadOrder {
        LoadOrder::PLUGIN
    }

    fn declared_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for plugin in self.discover() {
            names.push(command_name_from_package(plugin.name()).to_string());
            names.extend(plugin.command_names());
        }
        names
    }

    fn name_patterns(&self) -> Vec<&'static str> {
        plugin_name_patterns()
    }

    async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize> {
        let mut total = 0;
        for plugin in self.discover() {
            match install(&plugin, registry, CommandSource::Plugin) {
                Ok(count) => {
                    tracing::debug!("[plugin] Plugin loaded: {}", plugin.name());
                    total += count;
                }
                Err(e) => tracing::warn!("[plugin] Plugin load failed: {}: {}", plugin.name(), e),
            }
        }
        Ok(total)
    }
}

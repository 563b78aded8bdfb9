//! Devkit Loader
//!
//! Devkits are per-project builders. The project's `.feflowrc` maps commands
//! to `<package>:<builder>`:
//!
//! ```yaml
//! devkit:
//!   commands:
//!     dev:
//!       builder: "@tencent/feflow-devkit-ivweb:dev"
//!       options:
//!         port: 8080
//! ```
//!
//! and the package's `devkit.json` (under the project's `node_modules`)
//! describes each builder:
//!
//! ```json
//! { "builders": { "dev": { "implementation": "./bin/dev",
//!                          "description": "Start a dev server",
//!                          "optionsDescription": { "port": "Port to listen on" } } } }
//! ```
//!
//! Devkit commands load last, so a project can override any other source.

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
use serde_json::Value;

use super::process::ProcessCommand;
use super::{generator_name_patterns, SourceLoader};
use crate::services::picker::LoadOrder;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::NODE_MODULES_DIR;

/// Project config files, in lookup order.
pub const PROJECT_CONFIG_FILES: &[&str] = &[".feflowrc.yml", ".feflowrc.yaml", ".feflowrc.json"];
pub const DEVKIT_MANIFEST_FILE: &str = "devkit.json";
/// Environment variable carrying the configured builder options as JSON.
pub const ENV_DEVKIT_OPTIONS: &str = "FEFLOW_DEVKIT_OPTIONS";

#[derive(Debug, Clone, Deserialize)]
pub struct DevkitCommandConfig {
    /// `<package>:<builder>`
    pub builder: String,
    #[serde(default)]
    pub options: Value,
}

impl DevkitCommandConfig {
    /// Split `builder` into `(package, builder)`. Scoped packages contain no
    /// colon, so the last colon separates the two.
    pub fn target(&self) -> AppResult<(&str, &str)> {
        self.builder
            .rsplit_once(':')
            .filter(|(pkg, name)| !pkg.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                AppError::validation(format!(
                    "builder must be <package>:<builder>, got '{}'",
                    self.builder
                ))
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DevkitSection {
    #[serde(default)]
    commands: BTreeMap<String, DevkitCommandConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectConfig {
    #[serde(default)]
    devkit: Option<DevkitSection>,
}

/// Builder options as a list of specs or a `name → description` map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OptionsDescription {
    List(Vec<OptionSpec>),
    Map(BTreeMap<String, String>),
}

impl OptionsDescription {
    pub fn into_specs(self) -> Vec<OptionSpec> {
        match self {
            OptionsDescription::List(specs) => specs,
            OptionsDescription::Map(map) => map
                .into_iter()
                .map(|(name, description)| OptionSpec::new(name, description))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    pub implementation: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options_description: Option<OptionsDescription>,
}

#[derive(Debug, Clone, Deserialize)]
struct DevkitManifest {
    #[serde(default)]
    builders: BTreeMap<String, BuilderSpec>,
}

/// One configured devkit command, resolved against its package.
#[derive(Debug, Clone)]
pub struct DevkitCommand {
    command: String,
    package: String,
    package_dir: PathBuf,
    builder: BuilderSpec,
    options: Value,
}

impl DevkitCommand {
    fn resolve(project_dir: &Path, command: &str, config: &DevkitCommandConfig) -> AppResult<Self> {
        let (package, builder_name) = config.target()?;
        let package_dir = package
            .split('/')
            .fold(project_dir.join(NODE_MODULES_DIR), |dir, part| dir.join(part));

        let content = std::fs::read_to_string(package_dir.join(DEVKIT_MANIFEST_FILE))?;
        let manifest: DevkitManifest = serde_json::from_str(&content)?;
        let builder = manifest.builders.get(builder_name).cloned().ok_or_else(|| {
            AppError::not_found(format!("builder '{}' in {}", builder_name, package))
        })?;

        Ok(Self {
            command: command.to_string(),
            package: package.to_string(),
            package_dir,
            builder,
            options: config.options.clone(),
        })
    }
}

impl Plugin for DevkitCommand {
    fn name(&self) -> &str {
        &self.package
    }

    fn register(&self, ctx: &mut PluginContext<'_>) -> CoreResult<()> {
        if self.builder.implementation.is_empty() {
            return Err(CoreError::validation(format!(
                "{}: builder for '{}' has no implementation",
                self.package, self.command
            )));
        }

        let options = if self.options.is_null() {
            "{}".to_string()
        } else {
            self.options.to_string()
        };
        let handler = ProcessCommand::exec(self.package_dir.join(&self.builder.implementation))
            .with_env(ENV_DEVKIT_OPTIONS, options);

        let mut usage = CommandUsage::new(self.builder.description.clone());
        if let Some(described) = self.builder.options_description.clone() {
            usage.options = described.into_specs();
        }

        let descriptor = ctx
            .command(self.command.clone(), Arc::new(handler))
            .with_usage(usage);
        ctx.register(descriptor);
        Ok(())
    }
}

/// Loads devkit commands for the project in `project_dir`.
#[derive(Debug, Clone)]
pub struct DevkitLoader {
    project_dir: PathBuf,
}

impl DevkitLoader {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    /// First project config file present in the project directory.
    pub fn config_file(&self) -> Option<PathBuf> {
        PROJECT_CONFIG_FILES
            .iter()
            .map(|name| self.project_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Configured devkit commands. No config file means no commands; a
    /// malformed one is an error.
    pub fn configured_commands(&self) -> AppResult<BTreeMap<String, DevkitCommandConfig>> {
        let Some(path) = self.config_file() else {
            return Ok(BTreeMap::new());
        };
        let content = std::fs::read_to_string(&path)?;
        let config: ProjectConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config.devkit.map(|d| d.commands).unwrap_or_default())
    }
}

#[async_trait]
impl SourceLoader for DevkitLoader {
    fn name(&self) -> &'static str {
        "devkit"
    }

    fn flag(&self) -> LoadOrder {
        LoadOrder::DEVKIT
    }

    fn declared_names(&self) -> Vec<String> {
        match self.configured_commands() {
            Ok(commands) => commands.into_keys().collect(),
            Err(e) => {
                tracing::debug!("[devkit] No devkit commands: {}", e);
                Vec::new()
            }
        }
    }

    fn name_patterns(&self) -> Vec<&'static str> {
        generator_name_patterns()
    }

    async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize> {
        let mut total = 0;
        for (command, config) in self.configured_commands()? {
            let resolved = match DevkitCommand::resolve(&self.project_dir, &command, &config) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::warn!("[devkit] Devkit load failed for '{}': {}", command, e);
                    continue;
                }
            };
            match install(&resolved, registry, CommandSource::Devkit) {
                Ok(count) => total += count,
                Err(e) => tracing::warn!("[devkit] Devkit load failed for '{}': {}", command, e),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feflow_core::HookBus;
    use serde_json::json;

    fn project(config_name: &str, config_body: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(config_name), config_body).unwrap();
        let pkg = tmp.path().join("node_modules/@tencent/feflow-devkit-x");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("devkit.json"),
            json!({
                "builders": {
                    "dev": {
                        "implementation": "./bin/dev",
                        "description": "Start a dev server",
                        "optionsDescription": { "port": "Port to listen on" }
                    },
                    "build": {
                        "implementation": "./bin/build",
                        "optionsDescription": [{ "name": "minify", "alias": "m", "desc": "Minify" }]
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_loads_yaml_project_config() {
        let tmp = project(
            ".feflowrc.yml",
            "devkit:\n  commands:\n    dev:\n      builder: \"@tencent/feflow-devkit-x:dev\"\n      options:\n        port: 8080\n    build:\n      builder: \"@tencent/feflow-devkit-x:build\"\n",
        );

        let loader = DevkitLoader::new(tmp.path());
        assert_eq!(loader.declared_names(), vec!["build".to_string(), "dev".to_string()]);

        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
        assert_eq!(loader.load(&mut registry).await.unwrap(), 2);

        let dev = registry.get("dev").unwrap();
        assert_eq!(dev.source(), CommandSource::Devkit);
        assert_eq!(dev.owner(), "@tencent/feflow-devkit-x");
        assert_eq!(dev.description(), "Start a dev server");
        assert_eq!(dev.usage().unwrap().options[0].name, "port");

        let build = registry.get("build").unwrap();
        assert_eq!(build.usage().unwrap().options[0].alias.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn test_loads_json_project_config() {
        let tmp = project(
            ".feflowrc.json",
            &json!({ "devkit": { "commands": { "dev": { "builder": "@tencent/feflow-devkit-x:dev" } } } })
                .to_string(),
        );

        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
        DevkitLoader::new(tmp.path()).load(&mut registry).await.unwrap();
        assert!(registry.has("dev"));
    }

    #[tokio::test]
    async fn test_unknown_builder_is_skipped() {
        let tmp = project(
            ".feflowrc.yml",
            "devkit:\n  commands:\n    dev:\n      builder: \"@tencent/feflow-devkit-x:dev\"\n    lint:\n      builder: \"@tencent/feflow-devkit-x:lint\"\n",
        );

        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let count = DevkitLoader::new(tmp.path()).load(&mut registry).await.unwrap();
        assert_eq!(count, 1);
        assert!(!registry.has("lint"));
    }

    #[tokio::test]
    async fn test_no_project_config_registers_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let count = DevkitLoader::new(tmp.path()).load(&mut registry).await.unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_builder_target_parsing() {
        let config = DevkitCommandConfig {
            builder: "@scope/pkg:dev".into(),
            options: Value::Null,
        };
        assert_eq!(config.target().unwrap(), ("@scope/pkg", "dev"));

        let bad = DevkitCommandConfig {
            builder: "no-builder".into(),
            options: Value::Null,
        };
        assert!(bad.target().is_err());
    }
}

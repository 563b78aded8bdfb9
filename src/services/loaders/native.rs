//! Native Commands
//!
//! Commands compiled into the binary: `help`, `info`, `list`, `install` and
//! `uninstall`. They register through the same `Plugin` path as everything
//! else, so a later source can still override them.

use std::sync::Arc;

use async_trait::async_trait;
use feflow_core::plugin::install;
use feflow_core::{
    CommandContext, CommandHandler, CommandRegistry, CommandSource, CommandUsage, CoreError,
    CoreResult, Plugin, PluginContext,
};

use super::plugin::PluginLoader;
use super::universal::UniversalLoader;
use super::SourceLoader;
use crate::services::picker::LoadOrder;
use crate::services::update::PackageManager;
use crate::services::usage::render_global_help;
use crate::storage::DependencyManifest;
use crate::utils::error::AppResult;
use crate::utils::paths::FeflowPaths;

/// Owner recorded for compiled-in commands.
pub const NATIVE_OWNER: &str = "native";

pub const NATIVE_COMMANDS: &[&str] = &["help", "info", "list", "install", "uninstall"];

struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        println!("{}", render_global_help(ctx.registry, &ctx.version));
        Ok(())
    }
}

struct InfoCommand {
    package_manager: Option<String>,
}

impl InfoCommand {
    fn render(&self, ctx: &CommandContext<'_>) -> String {
        format!(
            "version: {}\nhome: {}\npackage manager: {}",
            ctx.version,
            ctx.home.display(),
            self.package_manager.as_deref().unwrap_or("(none)")
        )
    }
}

#[async_trait]
impl CommandHandler for InfoCommand {
    async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        println!("{}", self.render(ctx));
        Ok(())
    }
}

struct ListCommand {
    paths: FeflowPaths,
}

impl ListCommand {
    fn render(&self) -> String {
        let manifest = DependencyManifest::load(self.paths.manifest_file());
        let plugins: Vec<String> = PluginLoader::new(self.paths.clone())
            .installed_packages()
            .into_iter()
            .map(|name| {
                let version = manifest.version_of(&name).unwrap_or_default();
                format!("  {} {}", name, version).trim_end().to_string()
            })
            .collect();
        let universal: Vec<String> = UniversalLoader::new(self.paths.clone())
            .installed()
            .into_iter()
            .map(|(name, version)| format!("  {} {}", name, version))
            .collect();

        let mut out = String::from("Installed plugins:\n");
        if plugins.is_empty() {
            out.push_str("  (none)\n");
        } else {
            out.push_str(&plugins.join("\n"));
            out.push('\n');
        }
        out.push_str("\nUniversal packages:\n");
        if universal.is_empty() {
            out.push_str("  (none)");
        } else {
            out.push_str(&universal.join("\n"));
        }
        out
    }
}

#[async_trait]
impl CommandHandler for ListCommand {
    async fn call(&self, _ctx: &CommandContext<'_>) -> CoreResult<()> {
        println!("{}", self.render());
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum PackageAction {
    Install,
    Uninstall,
}

struct PackageCommand {
    action: PackageAction,
    paths: FeflowPaths,
    package_manager: Option<Arc<dyn PackageManager>>,
}

#[async_trait]
impl CommandHandler for PackageCommand {
    async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        let packages = ctx.args.positional().to_vec();
        if packages.is_empty() {
            return Err(CoreError::validation(format!(
                "Usage: fef {} <package...>",
                ctx.invoked_as
            )));
        }
        let pm = self.package_manager.as_ref().ok_or_else(|| {
            CoreError::config("No package manager available; set packageManager in .feflowrc.yml")
        })?;

        match self.action {
            PackageAction::Install => {
                tracing::info!("[native] Installing {}", packages.join(", "));
                pm.install(self.paths.root(), &packages).await?;
            }
            PackageAction::Uninstall => {
                tracing::info!("[native] Uninstalling {}", packages.join(", "));
                pm.uninstall(self.paths.root(), &packages).await?;
            }
        }
        Ok(())
    }
}

/// The compiled-in command set.
pub struct NativePlugin {
    paths: FeflowPaths,
    package_manager: Option<Arc<dyn PackageManager>>,
}

impl Plugin for NativePlugin {
    fn name(&self) -> &str {
        NATIVE_OWNER
    }

    fn register(&self, ctx: &mut PluginContext<'_>) -> CoreResult<()> {
        let help = ctx
            .command("help", Arc::new(HelpCommand))
            .with_usage(CommandUsage::new("Show all available commands"));
        ctx.register(help);

        let info = ctx
            .command(
                "info",
                Arc::new(InfoCommand {
                    package_manager: self.package_manager.as_ref().map(|pm| pm.name().to_string()),
                }),
            )
            .with_usage(CommandUsage::new("Show version and environment"));
        ctx.register(info);

        let list = ctx
            .command(
                "list",
                Arc::new(ListCommand {
                    paths: self.paths.clone(),
                }),
            )
            .with_usage(CommandUsage::new("List installed plugins"))
            .with_aliases(["ls"]);
        ctx.register(list);

        for (name, action, description, alias) in [
            ("install", PackageAction::Install, "Install plugins", "i"),
            ("uninstall", PackageAction::Uninstall, "Uninstall plugins", "rm"),
        ] {
            let descriptor = ctx
                .command(
                    name,
                    Arc::new(PackageCommand {
                        action,
                        paths: self.paths.clone(),
                        package_manager: self.package_manager.clone(),
                    }),
                )
                .with_usage(CommandUsage::new(description))
                .with_aliases([alias]);
            ctx.register(descriptor);
        }
        Ok(())
    }
}

/// Registers the compiled-in commands.
pub struct NativeLoader {
    plugin: NativePlugin,
}

impl NativeLoader {
    pub fn new(paths: FeflowPaths, package_manager: Option<Arc<dyn PackageManager>>) -> Self {
        Self {
            plugin: NativePlugin {
                paths,
                package_manager,
            },
        }
    }
}

#[async_trait]
impl SourceLoader for NativeLoader {
    fn name(&self) -> &'static str {
        "native"
    }

    fn flag(&self) -> LoadOrder {
        LoadOrder::NATIVE
    }

    fn declared_names(&self) -> Vec<String> {
        NATIVE_COMMANDS.iter().map(|c| c.to_string()).collect()
    }

    async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize> {
        Ok(install(&self.plugin, registry, CommandSource::Native)?)
    }
}

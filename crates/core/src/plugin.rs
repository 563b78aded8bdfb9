//! Plugin Capability
//!
//! A plugin is anything that can contribute commands given a registration
//! context. Loaders discover plugins (compiled in, or described by on-disk
//! manifests and backed by subprocesses) and drive them through `install`.

use std::sync::Arc;

use crate::command::{CommandDescriptor, CommandHandler, CommandSource};
use crate::error::CoreResult;
use crate::registry::CommandRegistry;

/// Registration entry point exposed by every plugin.
pub trait Plugin: Send + Sync {
    /// Package name of the plugin (recorded as the owner of its commands).
    fn name(&self) -> &str;

    /// Register this plugin's commands.
    fn register(&self, ctx: &mut PluginContext<'_>) -> CoreResult<()>;
}

/// Core context handed to `Plugin::register`.
pub struct PluginContext<'a> {
    registry: &'a mut CommandRegistry,
    source: CommandSource,
    owner: String,
    registered: usize,
}

impl<'a> PluginContext<'a> {
    pub fn new(
        registry: &'a mut CommandRegistry,
        source: CommandSource,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            source,
            owner: owner.into(),
            registered: 0,
        }
    }

    pub fn source(&self) -> CommandSource {
        self.source
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Start a descriptor owned by this plugin.
    pub fn command(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> CommandDescriptor {
        CommandDescriptor::new(name, self.source, self.owner.clone(), handler)
    }

    /// Hand a finished descriptor to the registry.
    pub fn register(&mut self, descriptor: CommandDescriptor) {
        self.registry.register(descriptor);
        self.registered += 1;
    }

    /// Whether a command is already known (e.g. to avoid clobbering).
    pub fn has(&self, name: &str) -> bool {
        self.registry.has(name)
    }

    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Run one plugin's registration against `registry`, returning how many
/// commands it contributed.
pub fn install(
    plugin: &dyn Plugin,
    registry: &mut CommandRegistry,
    source: CommandSource,
) -> CoreResult<usize> {
    let mut ctx = PluginContext::new(registry, source, plugin.name());
    plugin.register(&mut ctx)?;
    Ok(ctx.registered())
}

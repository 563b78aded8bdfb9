//! Command Registry
//!
//! Name → descriptor map with O(1) lookup and registration-order iteration.
//! Registration is monotonic: there is no unregister. A later registration for
//! an existing name replaces the earlier descriptor, which is how plugins
//! override built-ins and devkits override plugins.
//!
//! Every `register` call emits `onCommandRegistered` on the shared hook bus,
//! including overwrites.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command::{CommandDescriptor, CommandSource};
use crate::error::{CoreError, CoreResult};
use crate::hooks::{HookBus, HOOK_TYPE_ON_COMMAND_REGISTERED};

pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandDescriptor>>,
    /// Alias → primary name. Consulted only when no primary matches.
    aliases: HashMap<String, String>,
    /// First-registration order for deterministic listing.
    order: Vec<String>,
    hooks: Arc<HookBus>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.order)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl CommandRegistry {
    /// Create an empty registry publishing to `hooks`.
    pub fn new(hooks: Arc<HookBus>) -> Self {
        Self {
            commands: HashMap::new(),
            aliases: HashMap::new(),
            order: Vec::new(),
            hooks,
        }
    }

    /// Register a command, replacing any descriptor with the same name, then
    /// emit `onCommandRegistered` with the name as payload.
    pub fn register(&mut self, descriptor: CommandDescriptor) {
        let name = descriptor.name().to_string();

        if let Some(previous) = self.commands.get(&name) {
            tracing::debug!(
                "[registry] '{}' from {} ({}) overrides {} ({})",
                name,
                descriptor.owner(),
                descriptor.source(),
                previous.owner(),
                previous.source()
            );
            let stale: Vec<String> = previous.aliases().to_vec();
            self.aliases
                .retain(|alias, target| !(target == &name && stale.contains(alias)));
        } else {
            self.order.push(name.clone());
        }

        for alias in descriptor.aliases() {
            if alias != &name {
                self.aliases.insert(alias.clone(), name.clone());
            }
        }

        self.commands.insert(name.clone(), Arc::new(descriptor));
        self.hooks
            .emit(HOOK_TYPE_ON_COMMAND_REGISTERED, Value::String(name));
    }

    /// Look up a command by name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        if let Some(descriptor) = self.commands.get(name) {
            return Some(descriptor.clone());
        }
        self.aliases
            .get(name)
            .and_then(|primary| self.commands.get(primary))
            .cloned()
    }

    /// Like `get`, but with a not-found error.
    pub fn require(&self, name: &str) -> CoreResult<Arc<CommandDescriptor>> {
        self.get(name)
            .ok_or_else(|| CoreError::not_found(format!("Command not found: {}", name)))
    }

    /// Whether `name` resolves, by primary name or alias.
    pub fn has(&self, name: &str) -> bool {
        self.commands.contains_key(name)
            || self
                .aliases
                .get(name)
                .is_some_and(|primary| self.commands.contains_key(primary))
    }

    /// Primary names in first-registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Descriptors in first-registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandDescriptor>> + '_ {
        self.order.iter().filter_map(|name| self.commands.get(name))
    }

    /// Descriptors registered by `source`, in registration order.
    pub fn by_source(&self, source: CommandSource) -> Vec<Arc<CommandDescriptor>> {
        self.iter()
            .filter(|d| d.source() == source)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The bus this registry publishes to.
    pub fn hooks(&self) -> &Arc<HookBus> {
        &self.hooks
    }
}

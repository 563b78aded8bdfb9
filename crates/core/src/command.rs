//! Command Descriptors
//!
//! A command is split into its definition (name, owning source, usage schema,
//! aliases) and its execution capability (`CommandHandler`). Loaders build a
//! `CommandDescriptor` once and hand it to the registry; it is never mutated
//! afterwards.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::args::ParsedArgs;
use crate::error::CoreResult;
use crate::registry::CommandRegistry;

// ============================================================================
// Command Source
// ============================================================================

/// Which loader registered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Compiled into the binary
    Native,
    /// Installed through the universal package format
    Universal,
    /// Ecosystem plugin from the dependency manifest
    Plugin,
    /// Devkit builder declared by the current project
    Devkit,
}

impl std::fmt::Display for CommandSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandSource::Native => write!(f, "native"),
            CommandSource::Universal => write!(f, "universal"),
            CommandSource::Plugin => write!(f, "plugin"),
            CommandSource::Devkit => write!(f, "devkit"),
        }
    }
}

// ============================================================================
// Usage Schema
// ============================================================================

/// One declared option of a command, as rendered by `-h`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Long name without dashes (e.g. `env`)
    pub name: String,
    /// Single-letter alias without dash (e.g. `e`)
    #[serde(default)]
    pub alias: Option<String>,
    /// Value type label shown in usage (e.g. `string`)
    #[serde(default, rename = "type")]
    pub type_label: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default, rename = "default")]
    pub default_value: Option<Value>,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            type_label: None,
            description: description.into(),
            default_value: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_type(mut self, type_label: impl Into<String>) -> Self {
        self.type_label = Some(type_label.into());
        self
    }
}

/// Declared usage of a command: a description plus its options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandUsage {
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

impl CommandUsage {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Whether there is anything to render for `-h`.
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Everything a handler sees at invocation time.
pub struct CommandContext<'a> {
    /// Name the user typed (may be an alias)
    pub invoked_as: String,
    pub args: ParsedArgs,
    /// Working directory of the invocation
    pub cwd: PathBuf,
    /// Tool home directory (`~/.fef`)
    pub home: PathBuf,
    /// Version of the running tool
    pub version: String,
    /// Read-only view of everything registered so far
    pub registry: &'a CommandRegistry,
}

/// Execution capability of a command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()>;
}

// ============================================================================
// Descriptor
// ============================================================================

/// Registered representation of a command.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    source: CommandSource,
    owner: String,
    usage: Option<CommandUsage>,
    aliases: Vec<String>,
    handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("owner", &self.owner)
            .field("usage", &self.usage)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl CommandDescriptor {
    pub fn new(
        name: impl Into<String>,
        source: CommandSource,
        owner: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            owner: owner.into(),
            usage: None,
            aliases: Vec::new(),
            handler,
        }
    }

    pub fn with_usage(mut self, usage: CommandUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> CommandSource {
        self.source
    }

    /// Plugin or package that registered the command.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn usage(&self) -> Option<&CommandUsage> {
        self.usage.as_ref()
    }

    /// One-line description, empty when no usage was declared.
    pub fn description(&self) -> &str {
        self.usage.as_ref().map(|u| u.description.as_str()).unwrap_or("")
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub async fn call(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        self.handler.call(ctx).await
    }
}

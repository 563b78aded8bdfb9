//! Feflow Core
//!
//! Foundational types for the Feflow workspace: the lifecycle hook bus, the
//! command registry, command and plugin traits, parsed arguments and error
//! types. This crate has no dependency on the application stack (HTTP, YAML,
//! process spawning, terminal I/O).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `hooks` - Publish/subscribe bus for lifecycle events (`HookBus`)
//! - `command` - Command descriptor, handler trait and usage schema
//! - `registry` - Name → descriptor map (`CommandRegistry`)
//! - `plugin` - Registration capability implemented by every command source
//! - `args` - Minimist-style argument parsing handed to handlers
//! - `proxy` - Proxy configuration data types

pub mod args;
pub mod command;
pub mod error;
pub mod hooks;
pub mod plugin;
pub mod proxy;
pub mod registry;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Hooks ──────────────────────────────────────────────────────────────
pub use hooks::{HookBus, HookEvent, HookHandler, HOOK_TYPE_ON_COMMAND_REGISTERED};

// ── Commands ───────────────────────────────────────────────────────────
pub use command::{
    CommandContext, CommandDescriptor, CommandHandler, CommandSource, CommandUsage, OptionSpec,
};
pub use registry::CommandRegistry;

// ── Plugins ────────────────────────────────────────────────────────────
pub use plugin::{Plugin, PluginContext};

// ── Arguments & Proxy ──────────────────────────────────────────────────
pub use args::ParsedArgs;
pub use proxy::{ProxyConfig, ProxyProtocol};

//! Feflow - Command Resolution Core
//!
//! This library provides the front-end of the `fef` command-line tool.
//! It includes:
//! - Update gate (self-update and plugin drift checks)
//! - Command picker and the four source loaders
//! - Dispatcher, usage rendering and usage reporting
//! - Storage layer (YAML config, dependency manifest) and utilities

pub mod cli;
pub mod services;
pub mod storage;
pub mod utils;

pub use feflow_core::{CommandRegistry, HookBus, ParsedArgs};
pub use services::{DispatchOutcome, DispatchRequest, Feflow, LoadOrder};
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};

//! Utility Modules
//!
//! Error types, path resolution and logging setup.

pub mod error;
pub mod logging;
pub mod paths;

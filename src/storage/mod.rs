//! Storage Layer
//!
//! File-backed state under the tool home: the YAML config and the dependency
//! manifest.

pub mod config;
pub mod manifest;

pub use config::{ConfigService, FeflowConfig, SUPPORTED_PACKAGE_MANAGERS};
pub use manifest::DependencyManifest;

//! Package Naming Conventions
//!
//! Ecosystem packages are recognized by name alone: `feflow-plugin-*` for
//! command plugins, optionally scoped (`@scope/...`), and anything containing
//! `generator-` for scaffolding generators.

use regex::Regex;
use std::sync::OnceLock;

pub const PLUGIN_PREFIX: &str = "feflow-plugin-";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// `feflow-plugin-x` or `@scope/feflow-plugin-x`.
pub fn is_plugin_package(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"^feflow-plugin-|^@[^/]+/feflow-plugin-").is_some_and(|re| re.is_match(name))
}

/// `generator-x`, `@scope/generator-x` or `my-generator-x`; unanchored.
pub fn is_generator_package(name: &str) -> bool {
    name.contains("generator-")
}

/// Whether a dependency-manifest entry is something this tool manages.
pub fn is_managed_package(name: &str) -> bool {
    is_plugin_package(name) || is_generator_package(name)
}

/// Drop an `@scope/` prefix if present.
pub fn strip_scope(package: &str) -> &str {
    match package.strip_prefix('@') {
        Some(rest) => rest.split_once('/').map(|(_, name)| name).unwrap_or(package),
        None => package,
    }
}

/// Command name a package contributes by default:
/// `@scope/feflow-plugin-lint` → `lint`.
pub fn command_name_from_package(package: &str) -> &str {
    let bare = strip_scope(package);
    bare.strip_prefix(PLUGIN_PREFIX).unwrap_or(bare)
}

//! Package Manager Delegation
//!
//! The tool never installs anything itself: self-updates and plugin installs
//! are delegated to the configured package manager, spawned with inherited
//! stdio so its progress output reaches the user.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::services::update::registry::DEFAULT_REGISTRY_URL;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::CLI_PACKAGE_NAME;

/// Probed in this order when the config names no package manager.
pub const DETECTION_ORDER: &[&str] = &["tnpm", "cnpm", "npm", "yarn"];

/// Operations the tool delegates to a package manager.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Executable name (`npm`, `yarn`, ...).
    fn name(&self) -> &str;

    /// Registry the package manager is configured against.
    async fn registry_url(&self) -> String;

    /// Install the latest published version of the tool globally.
    /// A non-zero exit yields `AppError::Update` carrying the command line.
    async fn update_cli(&self) -> AppResult<()>;

    /// Install `packages` into `dir` (the tool home).
    async fn install(&self, dir: &Path, packages: &[String]) -> AppResult<()>;

    /// Remove `packages` from `dir`.
    async fn uninstall(&self, dir: &Path, packages: &[String]) -> AppResult<()>;
}

/// Arguments for the global self-update.
pub fn update_cli_args(pm: &str) -> Vec<String> {
    let latest = format!("{}@latest", CLI_PACKAGE_NAME);
    if pm == "yarn" {
        vec!["global".into(), "add".into(), latest, "--extract".into()]
    } else {
        vec![
            "install".into(),
            latest,
            "--color=always".into(),
            "--save".into(),
            "--save-exact".into(),
            "--loglevel".into(),
            "error".into(),
            "-g".into(),
        ]
    }
}

/// Arguments for installing plugins into the tool home.
pub fn install_args(pm: &str, packages: &[String]) -> Vec<String> {
    let verb = if pm == "yarn" { "add" } else { "install" };
    let mut args = vec![verb.to_string()];
    args.extend(packages.iter().cloned());
    if pm != "yarn" {
        args.push("--save".into());
    }
    args
}

/// Arguments for removing plugins from the tool home.
pub fn uninstall_args(pm: &str, packages: &[String]) -> Vec<String> {
    let verb = if pm == "yarn" { "remove" } else { "uninstall" };
    let mut args = vec![verb.to_string()];
    args.extend(packages.iter().cloned());
    if pm != "yarn" {
        args.push("--save".into());
    }
    args
}

/// Spawns the real package-manager executable.
#[derive(Debug, Clone)]
pub struct SystemPackageManager {
    name: String,
}

impl SystemPackageManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.name, args.join(" "))
    }

    /// Run with inherited stdio; `Ok(false)` on a non-zero exit.
    async fn run(&self, dir: Option<&Path>, args: &[String]) -> AppResult<bool> {
        let mut cmd = Command::new(&self.name);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        tracing::debug!("[pm] {}", self.command_line(args));

        let status = cmd.status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("{} is not installed", self.name))
            } else {
                AppError::command(format!("Failed to execute {}: {}", self.name, e))
            }
        })?;
        Ok(status.success())
    }
}

#[async_trait]
impl PackageManager for SystemPackageManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn registry_url(&self) -> String {
        let output = Command::new(&self.name)
            .args(["config", "get", "registry"])
            .stdin(std::process::Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let url = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if url.starts_with("http") {
                    url
                } else {
                    DEFAULT_REGISTRY_URL.to_string()
                }
            }
            Ok(_) | Err(_) => {
                tracing::debug!(
                    "[pm] Could not read registry from {}, using {}",
                    self.name,
                    DEFAULT_REGISTRY_URL
                );
                DEFAULT_REGISTRY_URL.to_string()
            }
        }
    }

    async fn update_cli(&self) -> AppResult<()> {
        let args = update_cli_args(&self.name);
        if self.run(None, &args).await? {
            Ok(())
        } else {
            Err(AppError::update(self.command_line(&args)))
        }
    }

    async fn install(&self, dir: &Path, packages: &[String]) -> AppResult<()> {
        let args = install_args(&self.name, packages);
        if self.run(Some(dir), &args).await? {
            Ok(())
        } else {
            Err(AppError::update(self.command_line(&args)))
        }
    }

    async fn uninstall(&self, dir: &Path, packages: &[String]) -> AppResult<()> {
        let args = uninstall_args(&self.name, packages);
        if self.run(Some(dir), &args).await? {
            Ok(())
        } else {
            Err(AppError::command(format!(
                "{} exited unsuccessfully",
                self.command_line(&args)
            )))
        }
    }
}

/// First package manager from `candidates` that answers `-v`.
pub async fn detect_package_manager(candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        let probe = Command::new(candidate)
            .arg("-v")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        match probe {
            Ok(status) if status.success() => {
                tracing::debug!("[pm] Detected package manager: {}", candidate);
                return Some(candidate.to_string());
            }
            _ => tracing::debug!("[pm] {} not available", candidate),
        }
    }
    None
}

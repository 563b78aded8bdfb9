//! Update Gate
//!
//! Throttled version check run before command resolution. At most one remote
//! check per freshness window; a newer tool version either updates
//! automatically, or asks. After the tool itself, installed plugins are
//! checked for drift and offered as one batch update.
//!
//! Network failures never block the requested command. Only a failed
//! package-manager run that the user opted into is surfaced as an error.

pub mod package_manager;
pub mod registry;
pub mod version;

use std::sync::Arc;

use serde_json::Value;

use crate::services::prompt::Prompter;
use crate::storage::{ConfigService, DependencyManifest};
use crate::utils::error::AppResult;
use crate::utils::paths::{FeflowPaths, CLI_PACKAGE_NAME, MANIFEST_FILE};

pub use package_manager::{detect_package_manager, PackageManager, SystemPackageManager};
pub use registry::{NpmRegistry, PackageManagerRegistry, VersionSource, DEFAULT_REGISTRY_URL};
pub use version::{compare_versions, is_newer};

/// Minimum interval between two remote checks.
pub const FRESHNESS_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Persisted state the gate reads and writes through the config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateState {
    pub last_update_check: Option<i64>,
    pub auto_update: bool,
    pub package_manager: Option<String>,
}

impl UpdateState {
    pub fn from_config(config: &ConfigService) -> Self {
        Self {
            last_update_check: config.last_update_check(),
            auto_update: config.auto_update(),
            package_manager: config.package_manager().map(str::to_string),
        }
    }

    /// Whether a check at `now_ms` falls inside the freshness window.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.last_update_check
            .is_some_and(|last| now_ms - last <= FRESHNESS_WINDOW_MS)
    }
}

/// What the gate did. `Updated` means the tool replaced itself and the
/// requested command must not run in this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Checks disabled by flag or config
    Disabled,
    /// Last check is inside the freshness window
    Throttled,
    /// Registry unreachable; nothing persisted
    Unreachable,
    /// Running the latest version
    UpToDate,
    /// A newer version exists and the user said no
    Declined { latest: String },
    /// The tool was updated; the caller exits
    Updated { latest: String },
}

impl GateOutcome {
    pub fn should_exit(&self) -> bool {
        matches!(self, GateOutcome::Updated { .. })
    }
}

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateOptions {
    pub auto_update: bool,
    pub disable_check: bool,
}

/// A plugin whose published version is ahead of the installed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDrift {
    pub name: String,
    pub local: String,
    pub latest: String,
}

pub struct UpdateGate {
    paths: FeflowPaths,
    current_version: String,
    versions: Arc<dyn VersionSource>,
    package_manager: Arc<dyn PackageManager>,
    prompter: Arc<dyn Prompter>,
}

impl UpdateGate {
    pub fn new(
        paths: FeflowPaths,
        current_version: impl Into<String>,
        versions: Arc<dyn VersionSource>,
        package_manager: Arc<dyn PackageManager>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            paths,
            current_version: current_version.into(),
            versions,
            package_manager,
            prompter,
        }
    }

    /// Run the gate against the current wall clock.
    pub async fn run(&self, config: &mut ConfigService, options: GateOptions) -> AppResult<GateOutcome> {
        self.run_at(config, options, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// Run the gate as if the time were `now_ms`.
    pub async fn run_at(
        &self,
        config: &mut ConfigService,
        options: GateOptions,
        now_ms: i64,
    ) -> AppResult<GateOutcome> {
        if options.disable_check || config.disable_check() {
            tracing::debug!("[update] Version checks disabled");
            return Ok(GateOutcome::Disabled);
        }

        let state = UpdateState::from_config(config);
        if state.is_fresh(now_ms) {
            tracing::debug!("[update] Checked recently, skipping");
            return Ok(GateOutcome::Throttled);
        }

        let latest = match self.versions.latest_version(CLI_PACKAGE_NAME).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "[update] Network error, giving up version check: {}",
                    e
                );
                return Ok(GateOutcome::Unreachable);
            }
        };

        let auto_update = options.auto_update || state.auto_update;
        tracing::debug!("[update] Auto update: {}", auto_update);

        let outcome = if is_newer(&latest, &self.current_version) {
            tracing::debug!(
                "[update] Found new version, current: {}, latest: {}",
                self.current_version,
                latest
            );
            if auto_update {
                tracing::info!(
                    "[update] Updating {} from {} to {}",
                    CLI_PACKAGE_NAME,
                    self.current_version,
                    latest
                );
                self.package_manager.update_cli().await?;
                return Ok(GateOutcome::Updated { latest });
            }

            let question = format!(
                "{}'s latest version is {}, but your version is {}. Do you want to update it?",
                CLI_PACKAGE_NAME, latest, self.current_version
            );
            if self.prompter.confirm(&question, true).await {
                self.package_manager.update_cli().await?;
                return Ok(GateOutcome::Updated { latest });
            }
            GateOutcome::Declined { latest }
        } else {
            tracing::debug!("[update] Current version is already latest");
            GateOutcome::UpToDate
        };

        config.set_last_update_check(now_ms);
        if let Err(e) = config.save() {
            tracing::warn!("[update] Failed to persist lastUpdateCheck: {}", e);
        }

        self.update_plugins().await?;
        Ok(outcome)
    }

    /// Installed plugins whose registry version is ahead. Lookup failures
    /// for individual plugins are skipped.
    pub async fn plugin_drift(&self) -> Vec<PluginDrift> {
        let manifest = DependencyManifest::load(self.paths.manifest_file());
        let mut drift = Vec::new();

        for name in manifest.managed_packages() {
            let dir = self.paths.plugin_dir(&name);
            let Some(local) = read_package_version(&dir.join(MANIFEST_FILE)) else {
                continue;
            };
            match self.versions.latest_version(&name).await {
                Ok(latest) if is_newer(&latest, &local) => drift.push(PluginDrift {
                    name,
                    local,
                    latest,
                }),
                Ok(_) => {}
                Err(e) => tracing::debug!("[update] Check plugin update error for {}: {}", name, e),
            }
        }

        if drift.is_empty() {
            tracing::debug!("[update] All plugins are at their latest version");
        }
        drift
    }

    /// Offer the drifted plugins as one batch; on acceptance rewrite the
    /// manifest, then install.
    async fn update_plugins(&self) -> AppResult<()> {
        let drift = self.plugin_drift().await;
        if drift.is_empty() {
            return Ok(());
        }

        println!("{}", render_drift_table(&drift));
        let question = format!("Update {} plugin(s) to their latest version?", drift.len());
        if !self.prompter.confirm(&question, true).await {
            return Ok(());
        }

        tracing::info!("[update] Updating plugins, this will take a few minutes");
        let mut manifest = DependencyManifest::load(self.paths.manifest_file());
        for plugin in &drift {
            manifest.set_version(&plugin.name, &plugin.latest);
        }
        manifest.save()?;

        let names: Vec<String> = drift.into_iter().map(|p| p.name).collect();
        self.package_manager.install(self.paths.root(), &names).await?;
        tracing::info!("[update] Plugin update success");
        Ok(())
    }
}

fn read_package_version(path: &std::path::Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let json: Value = serde_json::from_str(&content).ok()?;
    json.get("version")?.as_str().map(str::to_string)
}

/// Name / Version / Tag table for the drift prompt.
pub fn render_drift_table(drift: &[PluginDrift]) -> String {
    let rows: Vec<(String, String)> = drift
        .iter()
        .map(|p| (p.name.clone(), format!("{} -> {}", p.local, p.latest)))
        .collect();
    let name_width = rows.iter().map(|(n, _)| n.len()).chain([4]).max().unwrap_or(4);
    let version_width = rows.iter().map(|(_, v)| v.len()).chain([7]).max().unwrap_or(7);

    let mut out = format!(
        "{:<nw$}  {:<vw$}  {}\n",
        "Name",
        "Version",
        "Tag",
        nw = name_width,
        vw = version_width
    );
    for (name, version) in rows {
        out.push_str(&format!(
            "{:<nw$}  {:<vw$}  {}\n",
            name,
            version,
            "latest",
            nw = name_width,
            vw = version_width
        ));
    }
    out.trim_end().to_string()
}

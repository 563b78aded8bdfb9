//! Update Gate Integration Tests
//!
//! Throttling and persistence of the version check, with scripted network,
//! prompt and package-manager collaborators.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use feflow::services::prompt::Prompter;
use feflow::services::update::{
    GateOptions, GateOutcome, PackageManager, UpdateGate, VersionSource, FRESHNESS_WINDOW_MS,
};
use feflow::storage::ConfigService;
use feflow::utils::paths::FeflowPaths;
use feflow::{AppError, AppResult};

const NOW: i64 = 1_700_000_000_000;

struct CountingVersions {
    latest: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl VersionSource for CountingVersions {
    async fn latest_version(&self, _package: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest.to_string())
    }
}

struct UnreachableVersions;

#[async_trait]
impl VersionSource for UnreachableVersions {
    async fn latest_version(&self, _package: &str) -> AppResult<String> {
        Err(AppError::not_found("connect ETIMEDOUT"))
    }
}

#[derive(Default)]
struct CountingPrompter {
    asked: AtomicUsize,
}

#[async_trait]
impl Prompter for CountingPrompter {
    async fn confirm(&self, _message: &str, _default: bool) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        false
    }
}

struct FailingPm;

#[async_trait]
impl PackageManager for FailingPm {
    fn name(&self) -> &str {
        "npm"
    }

    async fn registry_url(&self) -> String {
        "https://registry.npmjs.org/".into()
    }

    async fn update_cli(&self) -> AppResult<()> {
        Err(AppError::update("npm install @feflow/cli@latest -g"))
    }

    async fn install(&self, _dir: &Path, _packages: &[String]) -> AppResult<()> {
        Ok(())
    }

    async fn uninstall(&self, _dir: &Path, _packages: &[String]) -> AppResult<()> {
        Ok(())
    }
}

fn gate(
    home: &TempDir,
    versions: Arc<dyn VersionSource>,
    prompter: Arc<dyn Prompter>,
) -> (UpdateGate, ConfigService) {
    let paths = FeflowPaths::from_root(home.path());
    let config = ConfigService::open(paths.config_file());
    let gate = UpdateGate::new(paths, "1.0.0", versions, Arc::new(FailingPm), prompter);
    (gate, config)
}

#[tokio::test]
async fn test_inside_window_makes_no_network_call() {
    let home = TempDir::new().unwrap();
    let versions = Arc::new(CountingVersions {
        latest: "9.9.9",
        calls: AtomicUsize::new(0),
    });
    let (gate, mut config) = gate(&home, versions.clone(), Arc::new(CountingPrompter::default()));
    config.set_last_update_check(NOW - FRESHNESS_WINDOW_MS / 2);

    let outcome = gate.run_at(&mut config, GateOptions::default(), NOW).await.unwrap();

    assert_eq!(outcome, GateOutcome::Throttled);
    assert_eq!(versions.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_newer_persists_timestamp_without_prompt() {
    let home = TempDir::new().unwrap();
    let prompter = Arc::new(CountingPrompter::default());
    let versions = Arc::new(CountingVersions {
        latest: "1.0.0",
        calls: AtomicUsize::new(0),
    });
    let (gate, mut config) = gate(&home, versions, prompter.clone());
    config.set_last_update_check(NOW - 2 * FRESHNESS_WINDOW_MS);

    let outcome = gate.run_at(&mut config, GateOptions::default(), NOW).await.unwrap();

    assert_eq!(outcome, GateOutcome::UpToDate);
    assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    let reopened = ConfigService::open(config.path());
    assert_eq!(reopened.last_update_check(), Some(NOW));
}

#[tokio::test]
async fn test_unreachable_registry_persists_nothing() {
    let home = TempDir::new().unwrap();
    let (gate, mut config) = gate(
        &home,
        Arc::new(UnreachableVersions),
        Arc::new(CountingPrompter::default()),
    );

    let outcome = gate.run_at(&mut config, GateOptions::default(), NOW).await.unwrap();

    assert_eq!(outcome, GateOutcome::Unreachable);
    assert!(ConfigService::open(config.path()).last_update_check().is_none());
}

#[tokio::test]
async fn test_failed_auto_update_surfaces_command_line() {
    let home = TempDir::new().unwrap();
    let versions = Arc::new(CountingVersions {
        latest: "2.0.0",
        calls: AtomicUsize::new(0),
    });
    let (gate, mut config) = gate(&home, versions, Arc::new(CountingPrompter::default()));
    let options = GateOptions {
        auto_update: true,
        disable_check: false,
    };

    let err = gate.run_at(&mut config, options, NOW).await.unwrap_err();

    assert!(matches!(err, AppError::Update { ref command } if command.contains("@feflow/cli@latest")));
}

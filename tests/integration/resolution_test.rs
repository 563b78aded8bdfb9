//! Resolution Integration Tests
//!
//! Real source loaders over a temporary tool home and project directory.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use feflow::services::loaders::{
    DevkitLoader, LoadPipeline, NativeLoader, PluginLoader, SourceLoader, UniversalLoader,
};
use feflow::services::picker::{CommandPicker, LoadOrder, Resolution};
use feflow::services::update::GateOptions;
use feflow::storage::ConfigService;
use feflow::utils::paths::FeflowPaths;
use feflow::{DispatchOutcome, DispatchRequest, Feflow, ParsedArgs};
use feflow_core::{CommandRegistry, CommandSource, HookBus, HOOK_TYPE_ON_COMMAND_REGISTERED};

// ============================================================================
// Helper Functions
// ============================================================================

/// Install `feflow-plugin-foo` declaring a `foo` command with one option.
fn install_foo_plugin(paths: &FeflowPaths) {
    fs::write(
        paths.manifest_file(),
        json!({ "name": "feflow-home", "dependencies": { "feflow-plugin-foo": "1.0.0" } }).to_string(),
    )
    .unwrap();

    let dir = paths.plugin_dir("feflow-plugin-foo");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        json!({
            "name": "feflow-plugin-foo",
            "version": "1.0.0",
            "feflow": {
                "commands": [{
                    "name": "foo",
                    "desc": "Do foo things",
                    "bin": "./bin/foo",
                    "options": [{ "name": "level", "alias": "l", "type": "number", "desc": "How much foo" }]
                }]
            }
        })
        .to_string(),
    )
    .unwrap();
}

fn loaders(paths: &FeflowPaths, project: &Path) -> Vec<Arc<dyn SourceLoader>> {
    vec![
        Arc::new(NativeLoader::new(paths.clone(), None)),
        Arc::new(UniversalLoader::new(paths.clone())),
        Arc::new(PluginLoader::new(paths.clone())),
        Arc::new(DevkitLoader::new(project)),
    ]
}

fn feflow(home: &TempDir, project: &TempDir) -> Feflow {
    let paths = FeflowPaths::from_root(home.path());
    let config = ConfigService::open(paths.config_file());
    let pipeline = LoadPipeline::new(loaders(&paths, project.path()));
    Feflow::new(paths, project.path(), "1.0.0", config, pipeline)
}

fn request(command: &str, args: &[&str]) -> DispatchRequest {
    DispatchRequest {
        command: Some(command.to_string()),
        args: ParsedArgs::parse(args.iter().copied()),
        options: GateOptions {
            auto_update: false,
            disable_check: true,
        },
    }
}

// ============================================================================
// Picker + Loaders
// ============================================================================

#[tokio::test]
async fn test_plugin_command_classified_and_resolved() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let paths = FeflowPaths::from_root(home.path());
    install_foo_plugin(&paths);

    let pipeline = LoadPipeline::new(loaders(&paths, project.path()));
    let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
    let mut picker = CommandPicker::new("foo");

    let decision = picker.decide(&registry, || pipeline.discover_policy());
    assert!(!decision.is_available);
    assert_eq!(decision.load_order, LoadOrder::PLUGIN);

    let report = pipeline.load(decision.load_order, &mut registry).await;
    assert_eq!(report.loaded, vec!["plugin"]);
    assert!(!registry.has("help"));

    match picker.check_command(&registry) {
        Resolution::Command(cmd) => {
            assert_eq!(cmd.source(), CommandSource::Plugin);
            assert_eq!(cmd.owner(), "feflow-plugin-foo");
        }
        Resolution::Help => panic!("foo should resolve after loading plugins"),
    }
}

#[tokio::test]
async fn test_package_name_routes_to_plugin_source() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let paths = FeflowPaths::from_root(home.path());

    let policy = LoadPipeline::new(loaders(&paths, project.path())).discover_policy();

    assert_eq!(policy.classify("feflow-plugin-anything"), LoadOrder::PLUGIN);
    assert_eq!(policy.classify("@scope/generator-web"), LoadOrder::DEVKIT);
    assert_eq!(policy.classify("info"), LoadOrder::NATIVE);
    assert_eq!(policy.classify("bar"), LoadOrder::ALL);
}

#[tokio::test]
async fn test_devkit_overrides_plugin_on_clash() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let paths = FeflowPaths::from_root(home.path());
    install_foo_plugin(&paths);

    fs::write(
        project.path().join(".feflowrc.yml"),
        "devkit:\n  commands:\n    foo:\n      builder: \"feflow-devkit-x:foo\"\n",
    )
    .unwrap();
    let kit = project.path().join("node_modules/feflow-devkit-x");
    fs::create_dir_all(&kit).unwrap();
    fs::write(
        kit.join("devkit.json"),
        json!({ "builders": { "foo": { "implementation": "./foo.sh", "description": "Project foo" } } })
            .to_string(),
    )
    .unwrap();

    let pipeline = LoadPipeline::new(loaders(&paths, project.path()));
    // Claimed by two sources, so everything loads.
    assert_eq!(pipeline.discover_policy().classify("foo"), LoadOrder::ALL);

    let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
    pipeline.load(LoadOrder::ALL, &mut registry).await;

    let foo = registry.get("foo").unwrap();
    assert_eq!(foo.source(), CommandSource::Devkit);
    assert_eq!(foo.description(), "Project foo");
}

#[tokio::test]
async fn test_corrupt_plugin_does_not_stop_other_sources() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let paths = FeflowPaths::from_root(home.path());
    install_foo_plugin(&paths);
    fs::write(paths.plugin_dir("feflow-plugin-foo").join("package.json"), "{ not json").unwrap();

    let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
    let report = LoadPipeline::new(loaders(&paths, project.path()))
        .load(LoadOrder::ALL, &mut registry)
        .await;

    assert!(report.failed.is_empty());
    assert!(!registry.has("foo"));
    assert!(registry.has("help"));
    assert!(registry.has("list"));
}

// ============================================================================
// Dispatcher
// ============================================================================

#[tokio::test]
async fn test_unknown_command_falls_back_to_help() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    install_foo_plugin(&FeflowPaths::from_root(home.path()));
    let mut feflow = feflow(&home, &project);

    let outcome = feflow.dispatch(request("bar", &[])).await.unwrap();

    match outcome {
        DispatchOutcome::Help { unknown, rendered } => {
            assert_eq!(unknown.as_deref(), Some("bar"));
            assert!(rendered.contains("Plugin commands"));
            assert!(rendered.contains("foo"));
        }
        other => panic!("expected help, got {:?}", other),
    }
    assert_eq!(feflow.loaded(), LoadOrder::ALL);
}

#[tokio::test]
async fn test_help_flag_renders_plugin_options() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    install_foo_plugin(&FeflowPaths::from_root(home.path()));
    let mut feflow = feflow(&home, &project);

    let outcome = feflow.dispatch(request("foo", &["-h"])).await.unwrap();

    match outcome {
        DispatchOutcome::Usage { command, rendered } => {
            assert_eq!(command, "foo");
            assert!(rendered.contains("Do foo things"));
            assert!(rendered.contains("-l, --level <number>"));
        }
        other => panic!("expected usage, got {:?}", other),
    }
    assert_eq!(feflow.loaded(), LoadOrder::PLUGIN);
}

#[tokio::test]
async fn test_registrations_are_announced_on_the_hook_bus() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    install_foo_plugin(&FeflowPaths::from_root(home.path()));
    let mut feflow = feflow(&home, &project);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    feflow
        .hooks()
        .subscribe(HOOK_TYPE_ON_COMMAND_REGISTERED, move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    feflow.dispatch(request("foo", &["-h"])).await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

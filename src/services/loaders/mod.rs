//! Source Loaders
//!
//! Each loader discovers the plugins of one source and registers their
//! commands. Loaders are independent of each other and idempotent: running
//! one twice only overwrites its own registrations.
//!
//! The pipeline runs whatever subset the picker selected in the fixed
//! sequence native → universal → plugin → devkit. A failing loader is logged
//! and skipped; the rest still run.

pub mod devkit;
pub mod native;
pub mod plugin;
pub mod process;
pub mod universal;

use std::sync::Arc;

use async_trait::async_trait;
use feflow_core::CommandRegistry;

use crate::services::picker::{LoadOrder, NameRule, PickPolicy};
use crate::utils::error::AppResult;

pub use devkit::DevkitLoader;
pub use native::NativeLoader;
pub use plugin::PluginLoader;
pub use universal::UniversalLoader;

/// One command source.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The single `LoadOrder` flag this loader answers to.
    fn flag(&self) -> LoadOrder;

    /// Command names this source would register, read from metadata only.
    /// Used to build the pick policy without loading anything.
    fn declared_names(&self) -> Vec<String>;

    /// Extra name patterns this source claims (e.g. package prefixes).
    fn name_patterns(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Register this source's commands. Returns how many were registered.
    async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize>;
}

/// What a pipeline run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Loaders that ran successfully, in run order.
    pub loaded: Vec<&'static str>,
    /// Loaders that failed, in run order.
    pub failed: Vec<&'static str>,
    pub registered: usize,
}

pub struct LoadPipeline {
    loaders: Vec<Arc<dyn SourceLoader>>,
}

impl LoadPipeline {
    pub fn new(loaders: Vec<Arc<dyn SourceLoader>>) -> Self {
        Self { loaders }
    }

    pub fn loaders(&self) -> &[Arc<dyn SourceLoader>] {
        &self.loaders
    }

    /// Run the loaders selected by `order`, in the fixed sequence.
    pub async fn load(&self, order: LoadOrder, registry: &mut CommandRegistry) -> LoadReport {
        tracing::debug!("[loaders] load order: {:?}", order);
        let mut report = LoadReport::default();

        for flag in LoadOrder::SEQUENCE {
            if !order.contains(flag) {
                continue;
            }
            for loader in self.loaders.iter().filter(|l| l.flag() == flag) {
                match loader.load(registry).await {
                    Ok(count) => {
                        tracing::debug!("[loaders] {} registered {} command(s)", loader.name(), count);
                        report.loaded.push(loader.name());
                        report.registered += count;
                    }
                    Err(e) => {
                        tracing::warn!("[loaders] {} failed to load: {}", loader.name(), e);
                        report.failed.push(loader.name());
                    }
                }
            }
        }

        report
    }

    /// Build the pick policy from every loader's cheap metadata.
    pub fn discover_policy(&self) -> PickPolicy {
        let mut policy = PickPolicy::new();
        for flag in LoadOrder::SEQUENCE {
            let mut rule = NameRule::new();
            for loader in self.loaders.iter().filter(|l| l.flag() == flag) {
                rule = rule.with_names(loader.declared_names());
                for pattern in loader.name_patterns() {
                    rule = match rule.clone().with_pattern(pattern) {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!("[loaders] {}: {}", loader.name(), e);
                            rule
                        }
                    };
                }
            }
            policy = policy.with_rule(flag, rule);
        }
        policy
    }
}

/// Package names typed directly as commands route to the plugin source.
pub(crate) fn plugin_name_patterns() -> Vec<&'static str> {
    vec![r"^feflow-plugin-", r"^@[^/]+/feflow-plugin-"]
}

/// Generator package names route to the devkit source.
pub(crate) fn generator_name_patterns() -> Vec<&'static str> {
    vec![r"^generator-", r"^@[^/]+/generator-"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use feflow_core::{CommandContext, CommandDescriptor, CommandHandler, CommandSource, CoreResult, HookBus};
    use std::sync::Mutex;

    use crate::utils::error::AppError;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn call(&self, _ctx: &CommandContext<'_>) -> CoreResult<()> {
            Ok(())
        }
    }

    struct FakeLoader {
        name: &'static str,
        flag: LoadOrder,
        commands: Vec<&'static str>,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeLoader {
        fn new(
            name: &'static str,
            flag: LoadOrder,
            commands: Vec<&'static str>,
            log: Arc<Mutex<Vec<&'static str>>>,
        ) -> Self {
            Self {
                name,
                flag,
                commands,
                fail: false,
                log,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl SourceLoader for FakeLoader {
        fn name(&self) -> &'static str {
            self.name
        }

        fn flag(&self) -> LoadOrder {
            self.flag
        }

        fn declared_names(&self) -> Vec<String> {
            self.commands.iter().map(|c| c.to_string()).collect()
        }

        async fn load(&self, registry: &mut CommandRegistry) -> AppResult<usize> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(AppError::validation("corrupted plugin"));
            }
            for cmd in &self.commands {
                registry.register(CommandDescriptor::new(
                    *cmd,
                    CommandSource::Plugin,
                    self.name,
                    Arc::new(Noop),
                ));
            }
            Ok(self.commands.len())
        }
    }

    fn pipeline(log: &Arc<Mutex<Vec<&'static str>>>, fail_third: bool) -> LoadPipeline {
        let plugin = FakeLoader::new("plugin", LoadOrder::PLUGIN, vec!["p", "shared"], log.clone());
        let plugin = if fail_third { plugin.failing() } else { plugin };
        // Deliberately registered out of sequence.
        LoadPipeline::new(vec![
            Arc::new(FakeLoader::new("devkit", LoadOrder::DEVKIT, vec!["d", "shared"], log.clone())),
            Arc::new(plugin),
            Arc::new(FakeLoader::new("universal", LoadOrder::UNIVERSAL, vec!["u"], log.clone())),
            Arc::new(FakeLoader::new("native", LoadOrder::NATIVE, vec!["n", "shared"], log.clone())),
        ])
    }

    #[tokio::test]
    async fn test_all_runs_in_fixed_sequence_and_last_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));

        let report = pipeline(&log, false).load(LoadOrder::ALL, &mut registry).await;

        assert_eq!(*log.lock().unwrap(), vec!["native", "universal", "plugin", "devkit"]);
        assert_eq!(report.loaded, vec!["native", "universal", "plugin", "devkit"]);
        assert_eq!(registry.get("shared").unwrap().owner(), "devkit");
    }

    #[tokio::test]
    async fn test_third_loader_failure_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));

        let report = pipeline(&log, true).load(LoadOrder::ALL, &mut registry).await;

        assert_eq!(report.failed, vec!["plugin"]);
        for name in ["n", "u", "d"] {
            assert!(registry.has(name), "missing {name}");
        }
        assert!(!registry.has("p"));
        assert_eq!(registry.get("shared").unwrap().owner(), "devkit");
    }

    #[tokio::test]
    async fn test_subset_runs_only_selected_sources() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));

        pipeline(&log, false)
            .load(LoadOrder::DEVKIT | LoadOrder::UNIVERSAL, &mut registry)
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["universal", "devkit"]);
        assert!(!registry.has("n"));
    }

    #[tokio::test]
    async fn test_loading_twice_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new(Arc::new(HookBus::new()));
        let p = pipeline(&log, false);

        p.load(LoadOrder::ALL, &mut registry).await;
        let names = registry.names();
        p.load(LoadOrder::ALL, &mut registry).await;

        assert_eq!(registry.names(), names);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_discover_policy_from_declared_names() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let policy = pipeline(&log, false).discover_policy();

        assert_eq!(policy.classify("p"), LoadOrder::PLUGIN);
        assert_eq!(policy.classify("u"), LoadOrder::UNIVERSAL);
        assert_eq!(policy.classify("shared"), LoadOrder::ALL);
        assert_eq!(policy.classify("unknown"), LoadOrder::ALL);
    }
}

//! Dispatcher
//!
//! One invocation, start to finish:
//!
//! ```text
//! update gate ──(updated)──────────────────────────────→ exit
//!      │
//!   picker ── registered? ─┬─ yes ─────────────────────→ run / usage
//!                          └─ load selected sources ─┬─→ run / usage
//!                                                    └─→ global help
//! ```
//!
//! The hook bus and registry live here and are threaded through explicitly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feflow_core::{CommandContext, CommandRegistry, HookBus, ParsedArgs, ProxyConfig};
use tracing::Instrument;

use crate::services::bootstrap::ensure_home;
use crate::services::loaders::{
    DevkitLoader, LoadPipeline, NativeLoader, PluginLoader, SourceLoader, UniversalLoader,
};
use crate::services::picker::{CommandPicker, LoadOrder, PickPolicy, Resolution};
use crate::services::prompt::StdinPrompter;
use crate::services::report::{HttpTransport, ReportPayload, Reporter};
use crate::services::update::package_manager::DETECTION_ORDER;
use crate::services::update::{
    detect_package_manager, GateOptions, GateOutcome, PackageManager, PackageManagerRegistry,
    SystemPackageManager, UpdateGate,
};
use crate::services::usage::{render_command_usage, render_global_help, BIN_NAME};
use crate::storage::ConfigService;
use crate::utils::error::AppResult;
use crate::utils::paths::FeflowPaths;

/// Command run when none is given.
pub const DEFAULT_COMMAND: &str = "help";

/// Parsed command line handed to `dispatch`.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub command: Option<String>,
    pub args: ParsedArgs,
    pub options: GateOptions,
}

/// What `dispatch` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command's handler ran to completion
    Executed { command: String },
    /// `-h` on a command with declared options
    Usage { command: String, rendered: String },
    /// Global help; `unknown` is set when it replaced an unresolved command
    Help {
        unknown: Option<String>,
        rendered: String,
    },
    /// The tool updated itself; nothing else ran
    Updated { latest: String },
}

pub struct Feflow {
    paths: FeflowPaths,
    cwd: PathBuf,
    version: String,
    registry: CommandRegistry,
    config: ConfigService,
    pipeline: LoadPipeline,
    policy: Option<PickPolicy>,
    loaded: LoadOrder,
    gate: Option<UpdateGate>,
    reporter: Option<Reporter>,
    pending_report: Option<tokio::task::JoinHandle<()>>,
}

impl Feflow {
    pub fn new(
        paths: FeflowPaths,
        cwd: impl Into<PathBuf>,
        version: impl Into<String>,
        config: ConfigService,
        pipeline: LoadPipeline,
    ) -> Self {
        Self {
            paths,
            cwd: cwd.into(),
            version: version.into(),
            registry: CommandRegistry::new(Arc::new(HookBus::new())),
            config,
            pipeline,
            policy: None,
            loaded: LoadOrder::empty(),
            gate: None,
            reporter: None,
            pending_report: None,
        }
    }

    pub fn with_gate(mut self, gate: UpdateGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Fixed classification rules instead of the ones discovered from the
    /// loaders.
    pub fn with_policy(mut self, policy: PickPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Wire up the real collaborators for the current user and directory.
    pub async fn bootstrap(cwd: impl Into<PathBuf>, version: impl Into<String>) -> AppResult<Self> {
        let cwd = cwd.into();
        let paths = FeflowPaths::discover()?;
        ensure_home(&paths)?;
        let mut config = ConfigService::open(paths.config_file());

        let pm_name = match config.package_manager() {
            Some(name) => Some(name.to_string()),
            None => {
                let detected = detect_package_manager(DETECTION_ORDER).await;
                if let Some(name) = &detected {
                    config.set_package_manager(name.clone())?;
                    if let Err(e) = config.save() {
                        tracing::warn!("[feflow] Failed to save config: {}", e);
                    }
                }
                detected
            }
        };
        let package_manager: Option<Arc<dyn PackageManager>> = match pm_name {
            Some(name) => Some(Arc::new(SystemPackageManager::new(name))),
            None => {
                tracing::error!(
                    "[feflow] You must install one of: {}",
                    DETECTION_ORDER.join(", ")
                );
                None
            }
        };

        let loaders: Vec<Arc<dyn SourceLoader>> = vec![
            Arc::new(NativeLoader::new(paths.clone(), package_manager.clone())),
            Arc::new(UniversalLoader::new(paths.clone())),
            Arc::new(PluginLoader::new(paths.clone())),
            Arc::new(DevkitLoader::new(cwd.clone())),
        ];

        let reporter = config.report_url().map(|url| {
            let proxy = config.report_proxy().and_then(|raw| match ProxyConfig::parse(raw) {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    tracing::warn!("[report] Ignoring reportProxy: {}", e);
                    None
                }
            });
            Reporter::new(url, proxy, Arc::new(HttpTransport))
        });

        let version = version.into();
        let mut feflow = Self::new(paths.clone(), cwd, version.clone(), config, LoadPipeline::new(loaders));
        if let Some(pm) = package_manager {
            feflow = feflow.with_gate(UpdateGate::new(
                paths,
                version,
                Arc::new(PackageManagerRegistry::new(pm.clone())),
                pm,
                Arc::new(StdinPrompter),
            ));
        }
        if let Some(reporter) = reporter {
            feflow = feflow.with_reporter(reporter);
        }
        Ok(feflow)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// For pre-registering commands before dispatch.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn hooks(&self) -> &Arc<HookBus> {
        self.registry.hooks()
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }

    /// Sources loaded so far in this process.
    pub fn loaded(&self) -> LoadOrder {
        self.loaded
    }

    /// Load `order`. When something new is needed, everything loaded so far
    /// is loaded again with it so the fixed sequence still decides clashes.
    async fn load(&mut self, order: LoadOrder) {
        if self.loaded.contains(order) {
            return;
        }
        let order = order | self.loaded;
        let report = self.pipeline.load(order, &mut self.registry).await;
        tracing::debug!(
            "[feflow] Loaded {:?}, {} command(s) registered",
            report.loaded,
            report.registered
        );
        self.loaded = order;
    }

    pub async fn dispatch(&mut self, request: DispatchRequest) -> AppResult<DispatchOutcome> {
        let DispatchRequest {
            command,
            args,
            options,
        } = request;
        let command = command.unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        if let Some(gate) = &self.gate {
            if let GateOutcome::Updated { latest } = gate.run(&mut self.config, options).await? {
                return Ok(DispatchOutcome::Updated { latest });
            }
        }

        let mut picker = CommandPicker::new(command.clone());
        let (cached, pipeline) = (&mut self.policy, &self.pipeline);
        let decision = picker.decide(&self.registry, || {
            cached
                .get_or_insert_with(|| pipeline.discover_policy())
                .clone()
        });
        let descriptor = if decision.is_available {
            picker.pick_command(&self.registry)
        } else {
            self.load(decision.load_order).await;
            match picker.check_command(&self.registry) {
                Resolution::Command(descriptor) => Some(descriptor),
                Resolution::Help => None,
            }
        };

        let Some(mut descriptor) = descriptor else {
            return Ok(self.global_help(Some(command)).await);
        };

        if args.wants_help() && descriptor.name() != DEFAULT_COMMAND {
            if let Some(usage) = descriptor.usage().filter(|u| u.has_options()) {
                let rendered = render_command_usage(descriptor.name(), usage);
                println!("{}", rendered);
                return Ok(DispatchOutcome::Usage { command, rendered });
            }
        }

        if descriptor.name() == DEFAULT_COMMAND {
            // The listing should cover every source.
            self.load(LoadOrder::ALL).await;
            if let Some(latest) = self.registry.get(&command) {
                descriptor = latest;
            }
        }

        let ctx = CommandContext {
            invoked_as: command.clone(),
            args: args.clone(),
            cwd: self.cwd.clone(),
            home: self.paths.root().to_path_buf(),
            version: self.version.clone(),
            registry: &self.registry,
        };
        let span = tracing::info_span!("plugin", name = %descriptor.owner());
        let result = descriptor.call(&ctx).instrument(span).await;

        if let Some(reporter) = &self.reporter {
            self.pending_report = Some(reporter.spawn(ReportPayload::new(&command, &args, &self.version)));
        }

        result?;
        Ok(DispatchOutcome::Executed { command })
    }

    async fn global_help(&mut self, unknown: Option<String>) -> DispatchOutcome {
        self.load(LoadOrder::ALL).await;
        let mut rendered = String::new();
        if let Some(name) = &unknown {
            rendered.push_str(&format!("{}: '{}' is not a {} command.\n\n", BIN_NAME, name, BIN_NAME));
        }
        rendered.push_str(&render_global_help(&self.registry, &self.version));
        println!("{}", rendered);
        DispatchOutcome::Help { unknown, rendered }
    }

    /// Give an in-flight report up to `grace` to finish.
    pub async fn flush_report(&mut self, grace: Duration) {
        if let Some(handle) = self.pending_report.take() {
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::debug!("[report] Gave up waiting for delivery");
            }
        }
    }
}

//! Command Picker
//!
//! Decides, per invocation, whether the requested command is already
//! registered (fast path, no loading at all) or which sources must be loaded
//! to find it. Classification is driven by a `PickPolicy`: one name rule per
//! source. A name claimed by exactly one source loads only that source;
//! anything else loads everything.
//!
//! ```text
//! Unresolved → Checking ─┬─ has(name) ──────────────────────→ Resolved
//!                        └─ Loading ─┬─ has(name) after load → Resolved
//!                                    └─ still absent ────────→ Fallback (help)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use bitflags::bitflags;
use feflow_core::{CommandDescriptor, CommandRegistry};
use regex::Regex;

use crate::utils::error::{AppError, AppResult};

bitflags! {
    /// Sources to load before retrying resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadOrder: u8 {
        const NATIVE    = 0b0001;
        const UNIVERSAL = 0b0010;
        const PLUGIN    = 0b0100;
        const DEVKIT    = 0b1000;
        const ALL = Self::NATIVE.bits()
            | Self::UNIVERSAL.bits()
            | Self::PLUGIN.bits()
            | Self::DEVKIT.bits();
    }
}

impl LoadOrder {
    /// The order sources run in whenever more than one is requested. Later
    /// sources override earlier ones on name clashes.
    pub const SEQUENCE: [LoadOrder; 4] = [
        LoadOrder::NATIVE,
        LoadOrder::UNIVERSAL,
        LoadOrder::PLUGIN,
        LoadOrder::DEVKIT,
    ];

    /// Whether exactly one source is selected.
    pub fn is_single(&self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// Names a single source is known to provide.
#[derive(Debug, Clone, Default)]
pub struct NameRule {
    exact: HashSet<String>,
    patterns: Vec<Regex>,
}

impl NameRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> AppResult<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| AppError::config(format!("invalid name pattern '{}': {}", pattern, e)))?;
        self.patterns.push(re);
        Ok(self)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.exact.contains(name) || self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// Name-classification rules, one per source.
#[derive(Debug, Clone, Default)]
pub struct PickPolicy {
    rules: Vec<(LoadOrder, NameRule)>,
}

impl PickPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule for one source, replacing any previous rule for it.
    pub fn with_rule(mut self, source: LoadOrder, rule: NameRule) -> Self {
        self.rules.retain(|(flag, _)| *flag != source);
        self.rules.push((source, rule));
        self
    }

    /// Sources whose rule claims `name`.
    pub fn matching(&self, name: &str) -> LoadOrder {
        self.rules
            .iter()
            .filter(|(_, rule)| rule.matches(name))
            .fold(LoadOrder::empty(), |acc, (flag, _)| acc | *flag)
    }

    /// Sources to load for `name`: the single claiming source, or `ALL` when
    /// no source or several sources claim it. Never empty.
    pub fn classify(&self, name: &str) -> LoadOrder {
        let matched = self.matching(name);
        if matched.is_single() {
            matched
        } else {
            LoadOrder::ALL
        }
    }
}

/// Where the picker is in resolving one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    Unresolved,
    Checking,
    Resolved,
    Loading,
    Fallback,
}

/// Fast-path verdict plus what to load otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerDecision {
    pub is_available: bool,
    pub load_order: LoadOrder,
}

/// Result of the post-load re-check.
#[derive(Debug, Clone)]
pub enum Resolution {
    Command(Arc<CommandDescriptor>),
    /// Nothing registered the name; show help instead.
    Help,
}

#[derive(Debug)]
pub struct CommandPicker {
    requested: String,
    state: PickerState,
}

impl CommandPicker {
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            state: PickerState::Unresolved,
        }
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    /// Registry lookup only; never loads anything.
    pub fn is_available(&self, registry: &CommandRegistry) -> bool {
        registry.has(&self.requested)
    }

    /// Sources to load for the requested name. Never empty.
    pub fn get_load_order(&self, policy: &PickPolicy) -> LoadOrder {
        policy.classify(&self.requested)
    }

    /// Take the fast-path decision and advance the state machine. `policy` is
    /// only asked for when the name is not registered yet.
    pub fn decide<F>(&mut self, registry: &CommandRegistry, policy: F) -> PickerDecision
    where
        F: FnOnce() -> PickPolicy,
    {
        self.state = PickerState::Checking;
        if self.is_available(registry) {
            self.state = PickerState::Resolved;
            tracing::debug!("[picker] '{}' already registered", self.requested);
            return PickerDecision {
                is_available: true,
                load_order: LoadOrder::empty(),
            };
        }

        let load_order = self.get_load_order(&policy());
        self.state = PickerState::Loading;
        tracing::debug!("[picker] '{}' needs load order {:?}", self.requested, load_order);
        PickerDecision {
            is_available: false,
            load_order,
        }
    }

    /// The resolved descriptor. Only answers once resolution succeeded; it
    /// never triggers loading.
    pub fn pick_command(&self, registry: &CommandRegistry) -> Option<Arc<CommandDescriptor>> {
        if self.state != PickerState::Resolved {
            return None;
        }
        registry.get(&self.requested)
    }

    /// Re-check after the selected sources were loaded.
    pub fn check_command(&mut self, registry: &CommandRegistry) -> Resolution {
        match registry.get(&self.requested) {
            Some(descriptor) => {
                self.state = PickerState::Resolved;
                Resolution::Command(descriptor)
            }
            None => {
                tracing::debug!(
                    "[picker] '{}' has not been registered, falling back to help",
                    self.requested
                );
                self.state = PickerState::Fallback;
                Resolution::Help
            }
        }
    }
}

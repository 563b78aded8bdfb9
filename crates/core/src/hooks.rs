//! Lifecycle Hook Bus
//!
//! Process-wide publish/subscribe channel keyed by lifecycle event names.
//!
//! Handlers execute sequentially in subscription order using Vec-based storage.
//! A handler that returns an error (or panics) is logged and isolated: sibling
//! handlers still run and nothing propagates back to the emitter.
//!
//! Emission is synchronous. A handler that needs asynchronous work spawns it
//! itself; `emit` never waits on it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Emitted by the command registry after every registration. Payload is the
/// command name as a JSON string.
pub const HOOK_TYPE_ON_COMMAND_REGISTERED: &str = "onCommandRegistered";

/// A single emission: event name plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub name: String,
    pub payload: Value,
}

/// Subscriber callback. Errors are logged by the bus.
pub type HookHandler = Arc<dyn Fn(&HookEvent) -> Result<(), String> + Send + Sync>;

/// Publish/subscribe bus shared (via `Arc`) by the registry, the dispatcher
/// and any observer such as telemetry.
///
/// `emit` runs a snapshot of the subscriber list taken when it starts, so a
/// handler may subscribe; the new handler sees the next emission.
#[derive(Default)]
pub struct HookBus {
    handlers: RwLock<HashMap<String, Vec<HookHandler>>>,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<&str, usize> = handlers
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        f.debug_struct("HookBus").field("handlers", &counts).finish()
    }
}

impl HookBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event_name`.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&HookEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Number of handlers subscribed to `event_name`.
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(event_name).map(Vec::len).unwrap_or(0)
    }

    /// Invoke every handler subscribed to `event_name`, in subscription order.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn emit(&self, event_name: &str, payload: Value) -> usize {
        let list: Vec<HookHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            match handlers.get(event_name) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };

        let event = HookEvent {
            name: event_name.to_string(),
            payload,
        };

        let mut delivered = 0;
        for (i, handler) in list.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!("[hooks] {} handler {} failed: {}", event_name, i, e);
                }
                Err(_) => {
                    tracing::warn!("[hooks] {} handler {} panicked", event_name, i);
                }
            }
        }
        delivered
    }
}

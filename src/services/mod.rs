//! Services Module
//!
//! Business logic: resolution, loading, update checks and reporting.

pub mod bootstrap;
pub mod dispatcher;
pub mod http;
pub mod loaders;
pub mod naming;
pub mod picker;
pub mod prompt;
pub mod report;
pub mod update;
pub mod usage;

pub use dispatcher::{DispatchOutcome, DispatchRequest, Feflow};
pub use picker::{CommandPicker, LoadOrder, PickPolicy};

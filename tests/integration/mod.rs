//! Integration Tests Module
//!
//! End-to-end resolution against real loaders on a temporary home, plus the
//! update gate's throttling behaviour.

// Command resolution through the picker, loaders and dispatcher
mod resolution_test;

// Update gate throttling and persistence
mod update_gate_test;

//! Plexus Hook - Lifecycle hooks for execution units
//!
//! This crate provides:
//! - Execution units with an observable `enabled` flag
//! - The per-context hook dispatch queue and hook worker
//! - `on_disabled` waiters run by the worker on behalf of a unit

pub mod lifecycle;
pub mod queue;

pub use lifecycle::*;
pub use queue::*;

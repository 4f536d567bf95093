//! Plexus Runtime - Contexts and their ambient services
//!
//! This crate ties the protocol crates together:
//! - Context: declarations, hook worker, inline state and shutdown
//! - Configuration (JSON and `PLEXUS_*` environment overrides)
//! - Tracing subscriber setup for context diagnostics

pub mod config;
pub mod context;
pub mod diagnostics;

pub use config::*;
pub use context::*;
pub use diagnostics::*;

pub use plexus_core::{
    desynchronized, identify, is_synchronized, ContextId, Fingerprint, Identifier, PlexusError,
    PlexusResult,
};
pub use plexus_hook::Unit;
pub use plexus_state::{EventChannel, EventPayload, Phase, StateChannel, StateValue};
pub use plexus_transport::{Namespace, Subscription};

//! Plexus Transport - Shared namespace and endpoints
//!
//! This crate provides the low-level cross-context substrate:
//! - Namespace with atomic find-or-create of endpoints
//! - Broadcast endpoints (ordered and parallel subscribers)
//! - Dispatch endpoints (invoke / on-invoke rendezvous)

pub mod endpoint;
pub mod dispatch;
pub mod namespace;

pub use endpoint::*;
pub use dispatch::*;
pub use namespace::*;

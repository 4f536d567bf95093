//! Plexus Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout Plexus:
//! - Content-addressed identifiers (Fingerprint, Identifier)
//! - Context and endpoint naming (ContextId, Role, EndpointKey)
//! - The synchronization probe that gates state writes
//! - Context-tagged diagnostics
//! - Error taxonomy

pub mod id;
pub mod sync;
pub mod error;
pub mod diag;

pub use id::*;
pub use sync::*;
pub use error::*;
pub use diag::*;

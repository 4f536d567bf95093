//! Plexus State - Event and state channels
//!
//! This crate implements the channel protocols on top of shared endpoints:
//! - Payload codec (values cross contexts as bytes)
//! - Event channels: stateless fan-out with no replay
//! - State channels: last-write-wins replication, late-joiner catch-up and
//!   write-authority handoff

pub mod codec;
pub mod event;
pub mod state;

pub use codec::*;
pub use event::*;
pub use state::*;

//! Error types for Plexus

use thiserror::Error;

use crate::{ContextId, EndpointKey, Fingerprint};

/// Core Plexus errors
#[derive(Error, Debug)]
pub enum PlexusError {
    // Protocol errors
    #[error("[{thread}] {context}: cannot set state {key} while not synchronized")]
    ProtocolViolation {
        context: ContextId,
        key: Fingerprint,
        thread: String,
    },

    // Declaration errors
    #[error("{context}: {key} is already declared in this context")]
    DuplicateDeclaration { context: ContextId, key: Fingerprint },

    #[error("Context {0} is closed")]
    ContextClosed(ContextId),

    // Hook errors
    #[error("Hook worker already registered for {0}")]
    WorkerAlreadyRegistered(ContextId),

    #[error("No dispatch handler bound at {0}")]
    DispatchUnbound(EndpointKey),

    #[error("No tokio runtime available on this thread")]
    NoRuntime,

    // Payload errors
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Result type for Plexus operations
pub type PlexusResult<T> = Result<T, PlexusError>;

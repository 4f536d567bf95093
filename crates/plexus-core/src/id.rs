//! Identity types for Plexus
//!
//! Channel identity is content-addressed: a declaration's call-site
//! fingerprint is hashed into a fixed-length identifier, so independently
//! loaded copies of the same declaration meet on the same endpoints without
//! any registry.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use sha2::{Digest, Sha256};

/// Identifier length in bytes (truncated SHA-256)
pub const IDENTIFIER_LEN: usize = 16;

/// Call-site fingerprint of a declaration
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub source: Cow<'static, str>,
    pub line: u32,
    pub column: u32,
}

impl Fingerprint {
    pub fn new(source: impl Into<Cow<'static, str>>, line: u32, column: u32) -> Self {
        Fingerprint {
            source: source.into(),
            line,
            column,
        }
    }

    /// Fingerprint from an explicit stable key
    pub fn key(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, 0, 0)
    }

    /// Fingerprint of the calling source location.
    ///
    /// The location is fixed at compile time, so every context running the
    /// same build derives the same fingerprint for the same declaration.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line(), location.column())
    }

    /// Canonical text form hashed by [`identify`]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.source, self.line, self.column)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.canonical())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 && self.column == 0 {
            f.write_str(&self.source)
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

/// Opaque channel identifier derived from a [`Fingerprint`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identifier(pub [u8; IDENTIFIER_LEN]);

impl Identifier {
    #[inline]
    pub fn to_bytes(self) -> [u8; IDENTIFIER_LEN] {
        self.0
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Identifier(bytes)
    }

    /// Identifier reserved for a context's own endpoints (hook dispatch)
    pub fn for_context(context: ContextId) -> Self {
        identify(&Fingerprint::key(format!("plexus::context#{}", context.0)))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Id(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Derive the identifier of a declaration (first 16 bytes of SHA-256)
pub fn identify(fingerprint: &Fingerprint) -> Identifier {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.canonical().as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; IDENTIFIER_LEN];
    bytes.copy_from_slice(&hash[..IDENTIFIER_LEN]);
    Identifier(bytes)
}

/// Context identity - one isolated execution environment
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContextId(pub u64);

impl ContextId {
    pub const ZERO: ContextId = ContextId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ContextId(id)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Endpoint role; an identifier never shares an endpoint across roles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Fire-and-forget event relay
    Event,
    /// State value-change notifications
    Changed,
    /// New participant announcements for a state channel
    Announce,
    /// Hook dispatch rendezvous (invoke-capable)
    HookDispatch,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Event => "event",
            Role::Changed => "changed",
            Role::Announce => "announce",
            Role::HookDispatch => "hook-dispatch",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of one endpoint inside the shared namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub id: Identifier,
    pub role: Role,
}

impl EndpointKey {
    #[inline]
    pub fn new(id: Identifier, role: Role) -> Self {
        EndpointKey { id, role }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.role)
    }
}

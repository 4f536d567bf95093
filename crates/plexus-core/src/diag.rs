//! Context-tagged diagnostics
//!
//! Verbose events are only emitted when the context's verbosity flag is on;
//! errors are always emitted. Every event carries the context and the
//! per-thread tag.

use std::fmt;

use crate::{thread_tag, ContextId};

#[derive(Clone, Copy, Debug)]
pub struct Diagnostics {
    pub context: ContextId,
    pub verbose: bool,
}

impl Diagnostics {
    pub fn new(context: ContextId, verbose: bool) -> Self {
        Diagnostics { context, verbose }
    }

    pub fn verbose(&self, message: fmt::Arguments<'_>) {
        if self.verbose {
            tracing::debug!(context = %self.context, thread = %thread_tag(), "{}", message);
        }
    }

    pub fn error(&self, message: fmt::Arguments<'_>) {
        tracing::error!(context = %self.context, thread = %thread_tag(), "{}", message);
    }
}

//! Dispatch endpoint - invoke-capable rendezvous node
//!
//! A dispatch endpoint hands a unit of work to whichever handler is bound
//! with `on_invoke`. The call is synchronous; the handler decides when and
//! where the work actually runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;

use plexus_core::{EndpointKey, PlexusError, PlexusResult};

/// Unit of work passed through a dispatch endpoint
pub type DispatchTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handler bound to a dispatch endpoint
pub type DispatchHandler = Arc<dyn Fn(DispatchTask) + Send + Sync>;

pub struct DispatchEndpoint {
    key: EndpointKey,
    handler: RwLock<Option<DispatchHandler>>,
}

impl DispatchEndpoint {
    pub fn new(key: EndpointKey) -> Self {
        DispatchEndpoint {
            key,
            handler: RwLock::new(None),
        }
    }

    pub fn key(&self) -> EndpointKey {
        self.key
    }

    /// Bind the handler, returning the previous one
    pub fn on_invoke(&self, handler: DispatchHandler) -> Option<DispatchHandler> {
        self.handler.write().replace(handler)
    }

    pub fn is_bound(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Hand a task to the bound handler
    pub fn invoke(&self, task: DispatchTask) -> PlexusResult<()> {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler(task);
                Ok(())
            }
            None => Err(PlexusError::DispatchUnbound(self.key)),
        }
    }
}

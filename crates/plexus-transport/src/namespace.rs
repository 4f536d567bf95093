//! Shared namespace - find-or-create endpoints under a well-known root
//!
//! Creation is atomic per key: concurrent first resolution from any number
//! of contexts binds every caller to the same endpoint, and exactly one of
//! them observes `was_created == true`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use plexus_core::{ContextId, EndpointKey};

use crate::{BroadcastEndpoint, DispatchEndpoint};

/// Default namespace root
pub const DEFAULT_ROOT: &str = "plexus";

/// Shared namespace tree (root -> identifier -> role)
pub struct Namespace {
    root: String,
    broadcast: Mutex<HashMap<EndpointKey, Arc<BroadcastEndpoint>>>,
    dispatch: Mutex<HashMap<EndpointKey, Arc<DispatchEndpoint>>>,
    next_context: AtomicU64,
}

impl Namespace {
    pub fn new(root: impl Into<String>) -> Arc<Self> {
        Arc::new(Namespace {
            root: root.into(),
            broadcast: Mutex::new(HashMap::new()),
            dispatch: Mutex::new(HashMap::new()),
            next_context: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full path of an endpoint under the root
    pub fn path(&self, key: EndpointKey) -> String {
        format!("{}/{}", self.root, key)
    }

    /// Allocate a fresh context identity
    pub fn allocate_context(&self) -> ContextId {
        ContextId::new(self.next_context.fetch_add(1, Ordering::Relaxed))
    }

    /// Find or create the broadcast endpoint for `key`
    pub fn resolve(&self, key: EndpointKey) -> (Arc<BroadcastEndpoint>, bool) {
        let mut endpoints = self.broadcast.lock();
        if let Some(existing) = endpoints.get(&key) {
            return (Arc::clone(existing), false);
        }

        let endpoint = Arc::new(BroadcastEndpoint::new(key, self.path(key)));
        endpoints.insert(key, Arc::clone(&endpoint));
        tracing::debug!(endpoint = %endpoint.path(), "created broadcast endpoint");
        (endpoint, true)
    }

    /// Find or create the dispatch endpoint for `key`
    pub fn resolve_dispatch(&self, key: EndpointKey) -> (Arc<DispatchEndpoint>, bool) {
        let mut endpoints = self.dispatch.lock();
        if let Some(existing) = endpoints.get(&key) {
            return (Arc::clone(existing), false);
        }

        let endpoint = Arc::new(DispatchEndpoint::new(key));
        endpoints.insert(key, Arc::clone(&endpoint));
        tracing::debug!(endpoint = %self.path(key), "created dispatch endpoint");
        (endpoint, true)
    }

    /// Look up a broadcast endpoint without creating it
    pub fn get(&self, key: EndpointKey) -> Option<Arc<BroadcastEndpoint>> {
        self.broadcast.lock().get(&key).cloned()
    }

    /// Remove every subscription owned by `context` from every endpoint
    pub fn evict(&self, context: ContextId) -> usize {
        let endpoints: Vec<Arc<BroadcastEndpoint>> =
            self.broadcast.lock().values().cloned().collect();

        let removed: usize = endpoints.iter().map(|e| e.remove_owned(context)).sum();
        tracing::debug!(%context, removed, "evicted context subscriptions");
        removed
    }

    pub fn endpoint_count(&self) -> usize {
        self.broadcast.lock().len() + self.dispatch.lock().len()
    }
}

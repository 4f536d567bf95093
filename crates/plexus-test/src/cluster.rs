//! Multi-context cluster for protocol testing

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use plexus_core::{Fingerprint, PlexusResult};
use plexus_runtime::{Context, RuntimeConfig};
use plexus_state::{StateChannel, StateValue};
use plexus_transport::Namespace;

/// A set of contexts sharing one namespace
pub struct Cluster {
    config: RuntimeConfig,
    namespace: Arc<Namespace>,
    contexts: Vec<Arc<Context>>,
}

impl Cluster {
    /// Create an empty cluster
    pub fn new(config: RuntimeConfig) -> Self {
        let namespace = config.namespace();
        Cluster {
            config,
            namespace,
            contexts: Vec::new(),
        }
    }

    /// Create a cluster with `count` verbose contexts
    pub fn with_contexts(count: usize) -> Self {
        let mut cluster = Self::new(RuntimeConfig::default().with_verbose(true));
        for i in 0..count {
            cluster.spawn(format!("context-{i}"));
        }
        cluster
    }

    /// Start a new context in the shared namespace
    pub fn spawn(&mut self, name: impl Into<String>) -> Arc<Context> {
        let context = Context::new(Arc::clone(&self.namespace), name, &self.config);
        self.contexts.push(Arc::clone(&context));
        context
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn contexts(&self) -> &[Arc<Context>] {
        &self.contexts
    }

    pub fn context(&self, index: usize) -> Option<&Arc<Context>> {
        self.contexts.get(index)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Register a hook worker in every context that lacks one
    pub fn register_hook_workers(&self) -> PlexusResult<()> {
        for context in &self.contexts {
            if !context.has_hook_worker() {
                context.register_hook_worker()?;
            }
        }
        Ok(())
    }

    /// Declare the same state channel in every live context, in spawn order
    pub fn declare_state<T: StateValue>(
        &self,
        key: &Fingerprint,
    ) -> PlexusResult<Vec<StateChannel<T>>> {
        self.contexts
            .iter()
            .filter(|context| !context.is_closed())
            .map(|context| context.declare_state(key.clone()))
            .collect()
    }

    /// Shut down one context; returns `false` if out of range or already closed
    pub fn shutdown(&self, index: usize) -> bool {
        self.contexts
            .get(index)
            .map(|context| context.shutdown())
            .unwrap_or(false)
    }
}

/// Number of channels currently holding authority
pub fn authorities<T: StateValue>(states: &[StateChannel<T>]) -> usize {
    states.iter().filter(|s| s.is_authoritative()).count()
}

/// The common value if every channel holds the same one
pub fn converged<T: StateValue>(states: &[StateChannel<T>]) -> Option<T> {
    let first = states.first()?.get()?;
    states
        .iter()
        .all(|s| s.get().as_ref() == Some(&first))
        .then_some(first)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Collects callback arguments for later assertions
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Recorder {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Recorder {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that records every argument it receives
    pub fn sink(&self) -> impl Fn(T) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |value| seen.lock().push(value)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_spawn() {
        let cluster = Cluster::with_contexts(3);
        assert_eq!(cluster.len(), 3);
        let ids: Vec<_> = cluster.contexts().iter().map(|c| c.id()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_declare_skips_closed_contexts() {
        let cluster = Cluster::with_contexts(3);
        assert!(cluster.shutdown(1));
        assert!(!cluster.shutdown(1));
        assert!(!cluster.shutdown(7));

        let states = cluster
            .declare_state::<u8>(&Fingerprint::key("skip"))
            .unwrap();
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_converged_requires_values() {
        let cluster = Cluster::with_contexts(2);
        let states = cluster
            .declare_state::<u8>(&Fingerprint::key("empty"))
            .unwrap();
        assert_eq!(converged(&states), None);

        states[0].set(4).unwrap();
        assert_eq!(converged(&states), Some(4));
        assert_eq!(authorities(&states), 1);
    }

    #[test]
    fn test_recorder_shares_storage() {
        let recorder = Recorder::new();
        let sink = recorder.sink();
        sink(1);
        recorder.clone().sink()(2);
        assert_eq!(recorder.snapshot(), vec![1, 2]);
    }
}

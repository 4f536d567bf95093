//! Plexus Context - one isolated execution environment
//!
//! A context owns its declaration registry, its hook queue and its root
//! unit. Contexts share nothing but the namespace; everything they agree on
//! flows through broadcast endpoints.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use plexus_core::{
    identify, ContextId, Diagnostics, EndpointKey, Fingerprint, Identifier, PlexusError,
    PlexusResult, Role,
};
use plexus_hook::{HookQueue, Unit};
use plexus_state::{EventChannel, EventPayload, StateBinding, StateChannel, StateValue};
use plexus_transport::Namespace;

use crate::RuntimeConfig;

/// Plexus execution context
pub struct Context {
    /// Context identity, unique within the namespace
    id: ContextId,
    name: String,
    namespace: Arc<Namespace>,
    diagnostics: Diagnostics,
    hooks: Arc<HookQueue>,
    /// Root unit; disabled on shutdown
    unit: Unit,
    /// Identifiers declared in this context
    declared: Mutex<HashMap<Identifier, Fingerprint>>,
    /// Shared with every channel handle declared here
    closed: Arc<AtomicBool>,
}

impl Context {
    pub fn new(
        namespace: Arc<Namespace>,
        name: impl Into<String>,
        config: &RuntimeConfig,
    ) -> Arc<Self> {
        let id = namespace.allocate_context();
        let name = name.into();
        let dispatch_key = EndpointKey::new(Identifier::for_context(id), Role::HookDispatch);
        let (dispatch, _) = namespace.resolve_dispatch(dispatch_key);

        info!(context = %id, %name, root = %namespace.root(), "context started");

        Arc::new(Context {
            id,
            unit: Unit::new(name.clone()),
            name,
            diagnostics: Diagnostics::new(id, config.verbose),
            hooks: Arc::new(HookQueue::new(id, dispatch)),
            namespace,
            declared: Mutex::new(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Root unit of this context
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Point-in-time probe of the calling thread
    pub fn is_synchronized(&self) -> bool {
        plexus_core::is_synchronized()
    }

    fn register(&self, key: &Fingerprint) -> PlexusResult<Identifier> {
        if self.is_closed() {
            return Err(PlexusError::ContextClosed(self.id));
        }

        let id = identify(key);
        let mut declared = self.declared.lock();
        if declared.contains_key(&id) {
            return Err(PlexusError::DuplicateDeclaration {
                context: self.id,
                key: key.clone(),
            });
        }
        declared.insert(id, key.clone());
        Ok(id)
    }

    /// Declare an event channel keyed by `key`
    pub fn declare_event<T: EventPayload>(&self, key: Fingerprint) -> PlexusResult<EventChannel<T>> {
        let id = self.register(&key)?;
        let (endpoint, created) = self.namespace.resolve(EndpointKey::new(id, Role::Event));
        self.diagnostics.verbose(format_args!(
            "declared event {key} at {} (created: {created})",
            endpoint.path()
        ));
        Ok(EventChannel::bind(
            id,
            self.id,
            endpoint,
            self.diagnostics,
            Arc::clone(&self.closed),
        ))
    }

    /// Declare a state channel keyed by `key` and announce this context
    pub fn declare_state<T: StateValue>(&self, key: Fingerprint) -> PlexusResult<StateChannel<T>> {
        self.register(&key)?;
        let binding = StateBinding::resolve(
            &self.namespace,
            key,
            self.id,
            Arc::clone(&self.hooks),
            self.unit.clone(),
            self.diagnostics,
            Arc::clone(&self.closed),
        );
        StateChannel::declare(binding)
    }

    /// Declare an event channel keyed by the calling source location
    #[track_caller]
    pub fn declare_event_here<T: EventPayload>(&self) -> PlexusResult<EventChannel<T>> {
        self.declare_event(Fingerprint::caller())
    }

    /// Declare a state channel keyed by the calling source location
    #[track_caller]
    pub fn declare_state_here<T: StateValue>(&self) -> PlexusResult<StateChannel<T>> {
        self.declare_state(Fingerprint::caller())
    }

    pub fn declared_count(&self) -> usize {
        self.declared.lock().len()
    }

    /// Run `callback` once `unit` is disabled, on this context's hook worker
    pub fn on_disabled(
        &self,
        unit: &Unit,
        callback: impl FnOnce() + Send + 'static,
    ) -> PlexusResult<()> {
        plexus_hook::on_disabled(&self.hooks, unit, callback)
    }

    /// Register this context's hook worker on the current tokio runtime
    pub fn register_hook_worker(&self) -> PlexusResult<()> {
        self.hooks.register_worker()
    }

    pub fn has_hook_worker(&self) -> bool {
        self.hooks.has_worker()
    }

    /// Hook tasks waiting for a worker
    pub fn hook_queue_len(&self) -> usize {
        self.hooks.len()
    }

    /// Current value of `state`, seeding it with `initial` if this context
    /// has never observed one.
    pub fn inline_state<T: StateValue>(
        &self,
        state: &StateChannel<T>,
        initial: T,
    ) -> PlexusResult<(T, Setter<T>)> {
        let value = match state.get() {
            Some(value) => value,
            None => state.set(initial)?,
        };
        Ok((value, Setter::new(state.clone())))
    }

    /// Leave the namespace and disable the root unit.
    ///
    /// Channel handles declared here reject writes and fires from now on.
    /// Subscriptions are evicted first, then lifecycle hooks (including
    /// authority vacate) fire. Returns `false` if already shut down.
    pub fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let evicted = self.namespace.evict(self.id);
        self.unit.disable();
        debug!(context = %self.id, evicted, "context subscriptions evicted");
        info!(context = %self.id, name = %self.name, "context shut down");
        true
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .field("hook_worker", &self.has_hook_worker())
            .finish()
    }
}

/// Cloneable write handle returned by [`Context::inline_state`]
pub struct Setter<T> {
    state: StateChannel<T>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Setter {
            state: self.state.clone(),
        }
    }
}

impl<T: StateValue> Setter<T> {
    fn new(state: StateChannel<T>) -> Self {
        Setter { state }
    }

    pub fn set(&self, value: T) -> PlexusResult<T> {
        self.state.set(value)
    }

    pub fn channel(&self) -> &StateChannel<T> {
        &self.state
    }
}

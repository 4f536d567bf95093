//! State channel - replicated last-write-wins value
//!
//! Every context keeps a local cache fed by the shared "changed" endpoint.
//! Authority (the duty to answer newcomers) is inferred, never granted: a
//! context is authoritative while the latest change it observed is its own.
//! Every context observes the same order of changes on one endpoint, so at
//! most one context holds authority once delivery quiesces.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use plexus_core::{
    identify, is_synchronized, thread_tag, ContextId, Diagnostics, EndpointKey, Fingerprint,
    Identifier, PlexusError, PlexusResult, Role,
};
use plexus_hook::{disabled_hook, HookQueue, Unit};
use plexus_transport::{BroadcastEndpoint, Delivery, Namespace, Subscription};

use crate::codec::{decode, encode, StateValue};

/// Identity of one change: who issued it and its per-origin sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub origin: u64,
    pub seq: u64,
}

/// Message on the changed endpoint
#[derive(Serialize, Deserialize)]
struct Change<V> {
    stamp: Stamp,
    value: V,
}

/// Message on the announce endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Announce {
    /// A context declared the channel and wants the current value
    Joined { from: u64 },
    /// The authority is shutting down; `last` is the last change it saw
    Vacated { from: u64, last: Stamp },
}

/// Per-context phase of a state channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No value observed yet
    Uninitialized,
    /// Holding a value, not responsible for newcomers
    Synced,
    /// Last writer; answers newcomer announcements
    Authoritative,
}

/// Everything a context binds when it declares a state channel
pub struct StateBinding {
    pub key: Fingerprint,
    pub id: Identifier,
    pub context: ContextId,
    pub changed: Arc<BroadcastEndpoint>,
    pub announce: Arc<BroadcastEndpoint>,
    pub hooks: Arc<HookQueue>,
    pub unit: Unit,
    pub diagnostics: Diagnostics,
    /// Set once the owning context shuts down
    pub closed: Arc<AtomicBool>,
}

impl StateBinding {
    /// Resolve both endpoints of `key` in `namespace`
    pub fn resolve(
        namespace: &Namespace,
        key: Fingerprint,
        context: ContextId,
        hooks: Arc<HookQueue>,
        unit: Unit,
        diagnostics: Diagnostics,
        closed: Arc<AtomicBool>,
    ) -> Self {
        let id = identify(&key);
        let (changed, created) = namespace.resolve(EndpointKey::new(id, Role::Changed));
        let (announce, _) = namespace.resolve(EndpointKey::new(id, Role::Announce));
        diagnostics.verbose(format_args!(
            "bound state {key} to {} (created: {created})",
            changed.path()
        ));

        StateBinding {
            key,
            id,
            context,
            changed,
            announce,
            hooks,
            unit,
            diagnostics,
            closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct StateCell<T> {
    current: Option<T>,
    /// Last sequence number this context issued
    issued: u64,
    last_seen: Option<Stamp>,
    /// Present iff this context is the authority
    responder: Option<Subscription>,
    vacate_hook: bool,
}

struct StateInner<T> {
    binding: StateBinding,
    cell: Mutex<StateCell<T>>,
}

/// Handle to one state declaration in one context
pub struct StateChannel<T> {
    inner: Arc<StateInner<T>>,
}

impl<T> Clone for StateChannel<T> {
    fn clone(&self) -> Self {
        StateChannel {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: StateValue> StateChannel<T> {
    /// Subscribe to the channel, then announce this context.
    ///
    /// The change listener is installed before the announcement fires so a
    /// reply from the authority cannot be missed.
    pub fn declare(binding: StateBinding) -> PlexusResult<Self> {
        let inner = Arc::new(StateInner {
            binding,
            cell: Mutex::new(StateCell {
                current: None,
                issued: 0,
                last_seen: None,
                responder: None,
                vacate_hook: false,
            }),
        });
        let context = inner.binding.context;

        let listener = Arc::clone(&inner);
        inner.binding.changed.subscribe(
            context,
            Delivery::ordered(move |bytes| listener.observe_change(bytes)),
        );

        let watcher = Arc::clone(&inner);
        inner.binding.announce.subscribe(
            context,
            Delivery::ordered(move |bytes| watcher.observe_announce(bytes)),
        );

        inner.announce(&Announce::Joined { from: context.0 })?;
        Ok(StateChannel { inner })
    }

    pub fn id(&self) -> Identifier {
        self.inner.binding.id
    }

    pub fn key(&self) -> &Fingerprint {
        &self.inner.binding.key
    }

    /// Last observed value, if any
    pub fn get(&self) -> Option<T> {
        self.inner.cell.lock().current.clone()
    }

    pub fn has_value(&self) -> bool {
        self.inner.cell.lock().current.is_some()
    }

    /// Broadcast a new value to every context, this one included.
    ///
    /// The local cache is updated by the same listener every other context
    /// runs, not here. Fails with `ContextClosed` after the owning context
    /// shut down and with `ProtocolViolation` when the calling thread is not
    /// synchronized.
    pub fn set(&self, value: T) -> PlexusResult<T> {
        let binding = &self.inner.binding;
        if binding.is_closed() {
            return Err(PlexusError::ContextClosed(binding.context));
        }
        if !is_synchronized() {
            let thread = thread_tag();
            binding.diagnostics.error(format_args!(
                "rejected write to {} while not synchronized",
                binding.key
            ));
            return Err(PlexusError::ProtocolViolation {
                context: binding.context,
                key: binding.key.clone(),
                thread,
            });
        }

        let seq = {
            let mut cell = self.inner.cell.lock();
            cell.issued += 1;
            cell.issued
        };
        self.inner.broadcast(seq, &value)?;
        Ok(value)
    }

    /// Subscribe to value changes in delivery order.
    ///
    /// The channel's own listener runs first, so `get()` already returns the
    /// delivered value when `callback` runs.
    pub fn changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let diagnostics = self.inner.binding.diagnostics;
        self.inner.binding.changed.subscribe(
            self.inner.binding.context,
            Delivery::ordered(move |bytes| match decode::<Change<T>>(bytes) {
                Ok(change) => callback(change.value),
                Err(e) => diagnostics.error(format_args!("dropping undecodable change: {e}")),
            }),
        )
    }

    /// Subscribe to value changes on the blocking pool
    pub fn changed_parallel<F>(&self, callback: F) -> PlexusResult<Subscription>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let diagnostics = self.inner.binding.diagnostics;
        let delivery = Delivery::parallel(move |bytes| match decode::<Change<T>>(&bytes) {
            Ok(change) => callback(change.value),
            Err(e) => diagnostics.error(format_args!("dropping undecodable change: {e}")),
        })?;
        Ok(self
            .inner
            .binding
            .changed
            .subscribe(self.inner.binding.context, delivery))
    }

    pub fn phase(&self) -> Phase {
        let cell = self.inner.cell.lock();
        let responding = cell
            .responder
            .as_ref()
            .is_some_and(|responder| responder.is_connected());

        if responding {
            Phase::Authoritative
        } else if cell.current.is_some() {
            Phase::Synced
        } else {
            Phase::Uninitialized
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.phase() == Phase::Authoritative
    }

    /// Whether the owning context has shut down
    pub fn is_closed(&self) -> bool {
        self.inner.binding.is_closed()
    }

    /// Announce this context again so the authority re-sends its value
    pub fn resync(&self) -> PlexusResult<()> {
        let binding = &self.inner.binding;
        if binding.is_closed() {
            return Err(PlexusError::ContextClosed(binding.context));
        }
        self.inner.announce(&Announce::Joined {
            from: binding.context.0,
        })
    }
}

impl<T: StateValue> StateInner<T> {
    fn stamp(&self, seq: u64) -> Stamp {
        Stamp {
            origin: self.binding.context.0,
            seq,
        }
    }

    fn broadcast(&self, seq: u64, value: &T) -> PlexusResult<()> {
        let message = encode(&Change {
            stamp: self.stamp(seq),
            value,
        })?;
        self.binding.changed.fire(message);
        Ok(())
    }

    fn announce(&self, announce: &Announce) -> PlexusResult<()> {
        self.binding.announce.fire(encode(announce)?);
        Ok(())
    }

    /// Shared listener on the changed endpoint
    fn observe_change(self: &Arc<Self>, bytes: &[u8]) {
        let diagnostics = self.binding.diagnostics;
        let change = match decode::<Change<T>>(bytes) {
            Ok(change) => change,
            Err(e) => {
                diagnostics.error(format_args!(
                    "dropping undecodable change on {}: {e}",
                    self.binding.key
                ));
                return;
            }
        };

        let mut cell = self.cell.lock();
        cell.last_seen = Some(change.stamp);

        if cell.current.as_ref() == Some(&change.value) {
            diagnostics.verbose(format_args!(
                "{} unchanged at {:?} from ctx-{}",
                self.binding.key, change.value, change.stamp.origin
            ));
        } else {
            diagnostics.verbose(format_args!(
                "{} changed to {:?} by ctx-{}",
                self.binding.key, change.value, change.stamp.origin
            ));
            cell.current = Some(change.value);
        }

        let mut first_authority = false;
        if change.stamp.origin == self.binding.context.0 && !self.binding.is_closed() {
            if cell.responder.is_none() {
                cell.responder = Some(self.install_responder());
                diagnostics.verbose(format_args!("now sync source for {}", self.binding.key));
            }
            first_authority = !cell.vacate_hook && self.binding.hooks.has_worker();
            cell.vacate_hook |= first_authority;
        } else if let Some(responder) = cell.responder.take() {
            responder.disconnect();
            diagnostics.verbose(format_args!(
                "handed {} over to ctx-{}",
                self.binding.key, change.stamp.origin
            ));
        }
        drop(cell);

        if first_authority {
            self.register_vacate_hook();
        }
    }

    fn install_responder(self: &Arc<Self>) -> Subscription {
        let responder = Arc::clone(self);
        self.binding.announce.subscribe(
            self.binding.context,
            Delivery::ordered(move |bytes| responder.answer_join(bytes)),
        )
    }

    /// Responder on the announce endpoint, installed only while authoritative
    fn answer_join(&self, bytes: &[u8]) {
        let from = match decode::<Announce>(bytes) {
            Ok(Announce::Joined { from }) => from,
            Ok(Announce::Vacated { .. }) => return,
            Err(e) => {
                self.binding
                    .diagnostics
                    .error(format_args!("dropping undecodable announcement: {e}"));
                return;
            }
        };
        if from == self.binding.context.0 || self.binding.is_closed() {
            return;
        }

        let reply = {
            let mut cell = self.cell.lock();
            if cell.responder.is_none() {
                return;
            }
            let Some(value) = cell.current.clone() else {
                return;
            };
            cell.issued += 1;
            (cell.issued, value)
        };

        self.binding.diagnostics.verbose(format_args!(
            "answering ctx-{from} on {} with {:?}",
            self.binding.key, reply.1
        ));
        if let Err(e) = self.broadcast(reply.0, &reply.1) {
            self.binding
                .diagnostics
                .error(format_args!("failed to answer ctx-{from}: {e}"));
        }
    }

    /// Permanent listener on the announce endpoint; claims vacated authority
    fn observe_announce(&self, bytes: &[u8]) {
        let (from, last) = match decode::<Announce>(bytes) {
            Ok(Announce::Vacated { from, last }) => (from, last),
            Ok(Announce::Joined { .. }) => return,
            Err(e) => {
                self.binding
                    .diagnostics
                    .error(format_args!("dropping undecodable announcement: {e}"));
                return;
            }
        };
        if from == self.binding.context.0 || self.binding.is_closed() {
            return;
        }

        // Only a context that saw nothing newer than the vacated write claims
        let claim = {
            let mut cell = self.cell.lock();
            if cell.last_seen != Some(last) {
                return;
            }
            let Some(value) = cell.current.clone() else {
                return;
            };
            cell.issued += 1;
            (cell.issued, value)
        };

        self.binding.diagnostics.verbose(format_args!(
            "claiming {} vacated by ctx-{from}",
            self.binding.key
        ));
        if let Err(e) = self.broadcast(claim.0, &claim.1) {
            self.binding
                .diagnostics
                .error(format_args!("failed to claim {}: {e}", self.binding.key));
        }
    }

    /// Queue the vacate hook on the hook worker.
    ///
    /// Only called once a worker exists; without one the context keeps its
    /// authority until it is handed over.
    fn register_vacate_hook(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let hook = disabled_hook(&self.binding.unit, move || inner.vacate());
        if let Err(e) = self.binding.hooks.enqueue(hook) {
            self.binding.diagnostics.error(format_args!(
                "failed to register vacate hook for {}: {e}",
                self.binding.key
            ));
        }
    }

    /// Give up authority when the context's unit is disabled
    fn vacate(&self) {
        let last = {
            let mut cell = self.cell.lock();
            match cell.responder.take() {
                Some(responder) => {
                    responder.disconnect();
                    cell.last_seen
                }
                None => None,
            }
        };
        let Some(last) = last else {
            return;
        };

        let from = self.binding.context.0;
        self.binding
            .diagnostics
            .verbose(format_args!("vacating {} at {:?}", self.binding.key, last));
        if let Err(e) = self.announce(&Announce::Vacated { from, last }) {
            self.binding
                .diagnostics
                .error(format_args!("failed to vacate {}: {e}", self.binding.key));
        }
    }
}

impl<T: StateValue> fmt::Debug for StateChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.inner.cell.lock();
        f.debug_struct("StateChannel")
            .field("key", &self.inner.binding.key)
            .field("context", &self.inner.binding.context)
            .field("current", &cell.current)
            .field("last_seen", &cell.last_seen)
            .finish()
    }
}

//! Broadcast endpoint - fire/subscribe relay shared by every context
//!
//! Each endpoint owns one delivery queue. Whoever fires while the endpoint
//! is idle becomes the drainer and delivers queued messages in order, so
//! every subscriber observes the same total order of broadcasts on one
//! endpoint. Fires issued during a drain (re-entrant or from another thread)
//! are queued behind the message in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;

use plexus_core::{desynchronized, ContextId, EndpointKey, PlexusError, PlexusResult};

/// Callback run on the draining thread, in delivery order
pub type OrderedCallback = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Callback dispatched to the blocking pool, unordered
pub type ParallelCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// How a subscriber receives broadcasts
#[derive(Clone)]
pub enum Delivery {
    Ordered(OrderedCallback),
    Parallel {
        callback: ParallelCallback,
        runtime: Handle,
    },
}

impl Delivery {
    pub fn ordered(callback: impl Fn(&Bytes) + Send + Sync + 'static) -> Self {
        Delivery::Ordered(Arc::new(callback))
    }

    /// Parallel delivery on the runtime of the calling thread
    pub fn parallel(callback: impl Fn(Bytes) + Send + Sync + 'static) -> PlexusResult<Self> {
        let runtime = Handle::try_current().map_err(|_| PlexusError::NoRuntime)?;
        Ok(Delivery::Parallel {
            callback: Arc::new(callback),
            runtime,
        })
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Delivery::Parallel { .. })
    }
}

struct Subscriber {
    id: u64,
    owner: ContextId,
    connected: AtomicBool,
    delivery: Delivery,
}

/// Delivery counters
#[derive(Clone, Debug, Default)]
pub struct EndpointStats {
    pub fired: u64,
    pub delivered: u64,
}

/// Shared broadcast endpoint for one (identifier, role)
pub struct BroadcastEndpoint {
    key: EndpointKey,
    path: String,
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    pending: Mutex<VecDeque<Bytes>>,
    draining: AtomicBool,
    next_subscriber: AtomicU64,
    fired: AtomicU64,
    delivered: AtomicU64,
}

/// Resets the drain flag even if a subscriber panics
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BroadcastEndpoint {
    pub fn new(key: EndpointKey, path: String) -> Self {
        BroadcastEndpoint {
            key,
            path,
            subscribers: RwLock::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            next_subscriber: AtomicU64::new(1),
            fired: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> EndpointKey {
        self.key
    }

    /// Full namespace path of this endpoint
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Broadcast a message to every current subscriber.
    ///
    /// Returns once the message is queued; it is delivered before this call
    /// returns unless another drain is already in progress.
    pub fn fire(&self, message: Bytes) {
        self.fired.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push_back(message);

        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    let next = self.pending.lock().pop_front();
                    let Some(message) = next else {
                        break;
                    };
                    self.deliver(&message);
                }
            }

            // A fire may have queued between the last pop and the release
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, message: &Bytes) {
        let snapshot: Vec<Arc<Subscriber>> = self.subscribers.read().clone();
        tracing::trace!(
            endpoint = %self.path,
            subscribers = snapshot.len(),
            bytes = message.len(),
            "delivering broadcast"
        );

        for subscriber in snapshot {
            if !subscriber.connected.load(Ordering::Acquire) {
                continue;
            }
            self.delivered.fetch_add(1, Ordering::Relaxed);

            match &subscriber.delivery {
                Delivery::Ordered(callback) => callback(message),
                Delivery::Parallel { callback, runtime } => {
                    let callback = Arc::clone(callback);
                    let message = message.clone();
                    runtime.spawn_blocking(move || desynchronized(|| callback(message)));
                }
            }
        }
    }

    /// Register a subscriber owned by `owner`
    pub fn subscribe(self: &Arc<Self>, owner: ContextId, delivery: Delivery) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let parallel = delivery.is_parallel();
        let subscriber = Arc::new(Subscriber {
            id,
            owner,
            connected: AtomicBool::new(true),
            delivery,
        });
        self.subscribers.write().push(subscriber);

        tracing::trace!(endpoint = %self.path, %owner, id, parallel, "subscribed");

        Subscription {
            endpoint: Arc::downgrade(self),
            id,
            owner,
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        match subscribers.iter().position(|s| s.id == id) {
            Some(pos) => {
                let removed = subscribers.remove(pos);
                removed.connected.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.subscribers.read().iter().any(|s| s.id == id)
    }

    /// Remove every subscriber owned by a context
    pub fn remove_owned(&self, owner: ContextId) -> usize {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| {
            if s.owner == owner {
                s.connected.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        before - subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            fired: self.fired.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

/// Handle to one subscription; dropping it leaves the subscription connected
pub struct Subscription {
    endpoint: Weak<BroadcastEndpoint>,
    id: u64,
    owner: ContextId,
}

impl Subscription {
    /// Stop receiving broadcasts. Idempotent.
    pub fn disconnect(&self) -> bool {
        match self.endpoint.upgrade() {
            Some(endpoint) => endpoint.unsubscribe(self.id),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint
            .upgrade()
            .map(|endpoint| endpoint.contains(self.id))
            .unwrap_or(false)
    }

    pub fn owner(&self) -> ContextId {
        self.owner
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}

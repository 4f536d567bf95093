//! Event channel - stateless fire/subscribe relay

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use plexus_core::{ContextId, Diagnostics, Identifier, PlexusError, PlexusResult};
use plexus_transport::{BroadcastEndpoint, Delivery, Subscription};

use crate::codec::{decode, encode, EventPayload};

struct EventInner {
    id: Identifier,
    context: ContextId,
    endpoint: Arc<BroadcastEndpoint>,
    diagnostics: Diagnostics,
    closed: Arc<AtomicBool>,
}

/// Handle to one event declaration in one context.
///
/// Nothing is stored between fires: a fire reaches the subscribers present
/// at that moment and is not replayed to later ones.
pub struct EventChannel<T> {
    inner: Arc<EventInner>,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        EventChannel {
            inner: Arc::clone(&self.inner),
            _payload: PhantomData,
        }
    }
}

impl<T: EventPayload> EventChannel<T> {
    pub fn bind(
        id: Identifier,
        context: ContextId,
        endpoint: Arc<BroadcastEndpoint>,
        diagnostics: Diagnostics,
        closed: Arc<AtomicBool>,
    ) -> Self {
        EventChannel {
            inner: Arc::new(EventInner {
                id,
                context,
                endpoint,
                diagnostics,
                closed,
            }),
            _payload: PhantomData,
        }
    }

    pub fn id(&self) -> Identifier {
        self.inner.id
    }

    /// Whether the owning context has shut down
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Broadcast `args` to every current subscriber in every context.
    ///
    /// Fails with `ContextClosed` once the owning context has shut down.
    pub fn fire(&self, args: &T) -> PlexusResult<()> {
        if self.is_closed() {
            return Err(PlexusError::ContextClosed(self.inner.context));
        }
        let message = encode(args)?;
        self.inner.diagnostics.verbose(format_args!(
            "fire {} ({} subscribers)",
            self.inner.endpoint.path(),
            self.inner.endpoint.subscriber_count()
        ));
        self.inner.endpoint.fire(message);
        Ok(())
    }

    /// Subscribe in delivery order on the firing thread
    pub fn connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let diagnostics = self.inner.diagnostics;
        self.inner.endpoint.subscribe(
            self.inner.context,
            Delivery::ordered(move |bytes| match decode::<T>(bytes) {
                Ok(args) => callback(args),
                Err(e) => diagnostics.error(format_args!("dropping undecodable event: {e}")),
            }),
        )
    }

    /// Subscribe on the blocking pool; never blocks the firing thread
    pub fn connect_parallel<F>(&self, callback: F) -> PlexusResult<Subscription>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let diagnostics = self.inner.diagnostics;
        let delivery = Delivery::parallel(move |bytes| match decode::<T>(&bytes) {
            Ok(args) => callback(args),
            Err(e) => diagnostics.error(format_args!("dropping undecodable event: {e}")),
        })?;
        Ok(self.inner.endpoint.subscribe(self.inner.context, delivery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use plexus_core::{identify, EndpointKey, Fingerprint, Role};
    use plexus_transport::Namespace;

    fn bound<T: EventPayload>(
        ns: &Namespace,
        context: u64,
        closed: Arc<AtomicBool>,
    ) -> EventChannel<T> {
        let id = identify(&Fingerprint::key("hit"));
        let (endpoint, _) = ns.resolve(EndpointKey::new(id, Role::Event));
        let context = ContextId::new(context);
        EventChannel::bind(id, context, endpoint, Diagnostics::new(context, true), closed)
    }

    fn channel<T: EventPayload>(ns: &Namespace, context: u64) -> EventChannel<T> {
        bound(ns, context, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_fire_with_zero_subscribers() {
        let ns = Namespace::new("test");
        let hit = channel::<u32>(&ns, 1);
        assert!(hit.fire(&7).is_ok());
    }

    #[test]
    fn test_fan_out_across_contexts() {
        let ns = Namespace::new("test");
        let a = channel::<(String, u32)>(&ns, 1);
        let b = channel::<(String, u32)>(&ns, 2);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (who, handle) in [("a", &a), ("b", &b)] {
            let seen = Arc::clone(&seen);
            handle.connect(move |args| seen.lock().push((who, args)));
        }

        a.fire(&("sword".to_string(), 12)).unwrap();

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a", ("sword".to_string(), 12)),
                ("b", ("sword".to_string(), 12)),
            ]
        );
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let ns = Namespace::new("test");
        let hit = channel::<u32>(&ns, 1);
        hit.fire(&1).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hit.connect(move |v| sink.lock().push(v));
        hit.fire(&2).unwrap();

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_mismatched_payload_is_dropped() {
        let ns = Namespace::new("test");
        let numbers = channel::<u32>(&ns, 1);
        let words = channel::<String>(&ns, 2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        numbers.connect(move |v| sink.lock().push(v));

        words.fire(&"oops".to_string()).unwrap();
        numbers.fire(&5).unwrap();

        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn test_fire_after_close_is_rejected() {
        let ns = Namespace::new("test");
        let closed = Arc::new(AtomicBool::new(false));
        let gone = bound::<u32>(&ns, 1, Arc::clone(&closed));
        let live = channel::<u32>(&ns, 2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        live.connect(move |v| sink.lock().push(v));

        gone.fire(&1).unwrap();
        closed.store(true, Ordering::Release);

        assert!(matches!(
            gone.fire(&2),
            Err(PlexusError::ContextClosed(c)) if c == ContextId::new(1)
        ));
        live.fire(&3).unwrap();
        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[test]
    fn test_connect_parallel_outside_runtime() {
        let ns = Namespace::new("test");
        let hit = channel::<u32>(&ns, 1);
        assert!(matches!(
            hit.connect_parallel(|_| {}),
            Err(PlexusError::NoRuntime)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connect_parallel_receives() {
        let ns = Namespace::new("test");
        let hit = channel::<u32>(&ns, 1);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hit.connect_parallel(move |v| {
            let _ = tx.send(v);
        })
        .unwrap();

        hit.fire(&9).unwrap();
        assert_eq!(rx.recv().await, Some(9));
    }
}

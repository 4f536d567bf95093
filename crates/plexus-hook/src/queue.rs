//! Hook dispatch queue
//!
//! A unit cannot observe its own disable transition, so lifecycle hooks are
//! handed to a per-context hook worker that waits on the unit's behalf.
//! Until a worker registers, hooks accumulate in an ordered queue; the
//! worker drains it once on registration and every later hook is dispatched
//! to it directly.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use plexus_core::{ContextId, PlexusError, PlexusResult};
use plexus_transport::{DispatchEndpoint, DispatchTask};

use crate::Unit;

/// Deferred lifecycle task
pub type HookTask = DispatchTask;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<HookTask>,
    worker: bool,
}

/// Per-context queue of hook tasks awaiting a worker
pub struct HookQueue {
    context: ContextId,
    dispatch: Arc<DispatchEndpoint>,
    state: Mutex<QueueState>,
}

impl HookQueue {
    pub fn new(context: ContextId, dispatch: Arc<DispatchEndpoint>) -> Self {
        HookQueue {
            context,
            dispatch,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn has_worker(&self) -> bool {
        self.state.lock().worker
    }

    /// Number of tasks waiting for a worker
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch to the worker, or queue until one registers
    pub fn enqueue(&self, task: HookTask) -> PlexusResult<()> {
        let mut state = self.state.lock();
        if !state.worker {
            state.pending.push_back(task);
            debug!(
                context = %self.context,
                queue_size = state.pending.len(),
                "queued hook task, no worker registered"
            );
            return Ok(());
        }
        drop(state);

        self.dispatch.invoke(task)
    }

    /// Register this context's hook worker and drain the queue into it.
    ///
    /// The worker runs on the tokio runtime of the calling thread and spawns
    /// every task it receives. A second registration is rejected.
    pub fn register_worker(&self) -> PlexusResult<()> {
        let runtime = Handle::try_current().map_err(|_| PlexusError::NoRuntime)?;

        let mut state = self.state.lock();
        if state.worker {
            return Err(PlexusError::WorkerAlreadyRegistered(self.context));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<HookTask>();
        let context = self.context;
        let spawner = runtime.clone();
        runtime.spawn(async move {
            while let Some(task) = rx.recv().await {
                spawner.spawn(task);
            }
            debug!(%context, "hook worker stopped");
        });

        self.dispatch.on_invoke(Arc::new(move |task| {
            if tx.send(task).is_err() {
                warn!(%context, "hook worker gone, dropping hook task");
            }
        }));
        state.worker = true;

        let drained = state.pending.len();
        for task in state.pending.drain(..) {
            self.dispatch.invoke(task)?;
        }

        info!(%context, drained, "hook worker registered");
        Ok(())
    }
}

/// Task that waits for `unit` to be disabled, then runs `callback`.
///
/// Nothing runs until the task is handed to a [`HookQueue`].
pub fn disabled_hook(unit: &Unit, callback: impl FnOnce() + Send + 'static) -> HookTask {
    let mut enabled = unit.watch();
    let name = unit.name().to_string();
    Box::pin(async move {
        let disabled = enabled.wait_for(|enabled| !*enabled).await.is_ok();
        if disabled {
            debug!(unit = %name, "unit disabled, running hook");
            callback();
        } else {
            debug!(unit = %name, "unit dropped while enabled, discarding hook");
        }
    })
}

/// Run `callback` once `unit` is disabled.
///
/// The wait happens on the context's hook worker. Registering before the
/// worker exists is allowed but logged; the hook runs once both the worker
/// is registered and the unit is disabled, in either order.
pub fn on_disabled(
    queue: &HookQueue,
    unit: &Unit,
    callback: impl FnOnce() + Send + 'static,
) -> PlexusResult<()> {
    if !queue.has_worker() {
        warn!(
            context = %queue.context(),
            unit = %unit.name(),
            "on_disabled registered before a hook worker; it will wait for one"
        );
    }
    queue.enqueue(disabled_hook(unit, callback))
}

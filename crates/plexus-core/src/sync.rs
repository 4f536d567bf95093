//! Synchronization probe
//!
//! A thread is "synchronized" unless it is running inside a desynchronized
//! section (parallel subscriber callbacks always are). State writes are
//! gated on this probe, re-evaluated on every call.

use std::cell::Cell;
use std::marker::PhantomData;
use std::thread;

thread_local! {
    static DESYNC_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Point-in-time probe for the current thread
pub fn is_synchronized() -> bool {
    DESYNC_DEPTH.with(|depth| depth.get() == 0)
}

/// Marks the current thread desynchronized until dropped.
///
/// Guards nest; the thread is synchronized again once every guard is gone.
/// The guard is `!Send` because it describes the thread that created it.
pub struct DesyncGuard {
    _not_send: PhantomData<*const ()>,
}

impl DesyncGuard {
    pub fn enter() -> Self {
        DESYNC_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DesyncGuard {
            _not_send: PhantomData,
        }
    }
}

impl Drop for DesyncGuard {
    fn drop(&mut self) {
        DESYNC_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f` with the current thread desynchronized
pub fn desynchronized<R>(f: impl FnOnce() -> R) -> R {
    let _guard = DesyncGuard::enter();
    f()
}

/// Per-thread tag used in diagnostics and error messages
pub fn thread_tag() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => format!("{name}/{:?}", current.id()),
        None => format!("{:?}", current.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronized_by_default() {
        assert!(is_synchronized());
    }

    #[test]
    fn test_desynchronized_scope() {
        let inside = desynchronized(is_synchronized);
        assert!(!inside);
        assert!(is_synchronized());
    }

    #[test]
    fn test_guards_nest() {
        let outer = DesyncGuard::enter();
        {
            let _inner = DesyncGuard::enter();
            assert!(!is_synchronized());
        }
        assert!(!is_synchronized());
        drop(outer);
        assert!(is_synchronized());
    }

    #[test]
    fn test_probe_is_per_thread() {
        let _guard = DesyncGuard::enter();
        let other = thread::spawn(is_synchronized).join().unwrap();
        assert!(other);
        assert!(!is_synchronized());
    }

    #[test]
    fn test_thread_tag_uses_name() {
        let tag = thread::Builder::new()
            .name("plexus-probe".into())
            .spawn(thread_tag)
            .unwrap()
            .join()
            .unwrap();
        assert!(tag.starts_with("plexus-probe/"));
    }
}

//! Execution units and their `enabled` property

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

struct UnitInner {
    name: String,
    enabled: watch::Sender<bool>,
}

/// A unit of execution with an observable `enabled` flag.
///
/// Clones share the same flag. Units start enabled.
#[derive(Clone)]
pub struct Unit {
    inner: Arc<UnitInner>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        let (enabled, _) = watch::channel(true);
        Unit {
            inner: Arc::new(UnitInner {
                name: name.into(),
                enabled,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_enabled(&self) -> bool {
        *self.inner.enabled.borrow()
    }

    /// Set the flag; returns `true` if it changed
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let changed = self.inner.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
        if changed {
            tracing::debug!(unit = %self.inner.name, enabled, "unit enabled changed");
        }
        changed
    }

    pub fn disable(&self) -> bool {
        self.set_enabled(false)
    }

    pub fn enable(&self) -> bool {
        self.set_enabled(true)
    }

    /// Change notifications for the flag
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.enabled.subscribe()
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.inner.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_starts_enabled() {
        let unit = Unit::new("script");
        assert!(unit.is_enabled());
        assert_eq!(unit.name(), "script");
    }

    #[test]
    fn test_set_enabled_reports_change() {
        let unit = Unit::new("script");
        assert!(unit.disable());
        assert!(!unit.disable());
        assert!(!unit.is_enabled());
        assert!(unit.enable());
    }

    #[test]
    fn test_clones_share_flag() {
        let unit = Unit::new("script");
        let clone = unit.clone();
        clone.disable();
        assert!(!unit.is_enabled());
    }

    #[tokio::test]
    async fn test_watch_observes_disable() {
        let unit = Unit::new("script");
        let mut rx = unit.watch();
        unit.disable();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}

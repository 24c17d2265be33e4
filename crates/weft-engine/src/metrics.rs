//! Cumulative counters for a store.

/// Counters maintained by a [`Store`](crate::Store) over its lifetime.
///
/// Read a copy with [`Store::metrics()`](crate::Store::metrics).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Write epochs started (PRISTINE → MUTATING transitions), including
    /// those started by upward propagation.
    pub epochs_started: u64,
    /// Epochs frozen (MUTATING → PRISTINE transitions).
    pub freezes: u64,
    /// Settlement passes run, from completion futures or `settle_all`.
    pub settlements: u64,
    /// Parent edges inserted.
    pub edges_added: u64,
    /// Parent edges removed, including those dropped with their parent.
    pub edges_removed: u64,
    /// Completion requests registered against a mutating epoch.
    pub watchers_registered: u64,
    /// Reference cycles detected on edge insertion.
    pub cycles_detected: u64,
    /// Tracked instances currently alive.
    pub live_objects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StoreMetrics::default();
        assert_eq!(m.epochs_started, 0);
        assert_eq!(m.freezes, 0);
        assert_eq!(m.settlements, 0);
        assert_eq!(m.edges_added, 0);
        assert_eq!(m.edges_removed, 0);
        assert_eq!(m.watchers_registered, 0);
        assert_eq!(m.cycles_detected, 0);
        assert_eq!(m.live_objects, 0);
    }
}

//! Aggregate per-event-name dispatch metrics.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

/// Snapshot of the counters for one event name.
///
/// Serializable so health endpoints can export it as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Events fully processed under this name (including filtered drops).
    pub processed: u64,
    /// Individual listener failures observed.
    pub errors: u64,
    /// Cumulative wall-clock time spent processing events of this name.
    pub cumulative_time: Duration,
}

/// Per-event-name counters, owned by one dispatcher instance.
#[derive(Default)]
pub(crate) struct DispatchMetrics {
    names: RwLock<HashMap<String, MetricsSnapshot>>,
}

impl DispatchMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, name: &str, errors: u64, elapsed: Duration) {
        let mut names = self.names.write();
        let entry = names.entry(name.to_string()).or_default();
        entry.processed += 1;
        entry.errors += errors;
        entry.cumulative_time += elapsed;
    }

    pub(crate) fn snapshot(&self, name: &str) -> MetricsSnapshot {
        self.names.read().get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_zeroed() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.snapshot("nothing"), MetricsSnapshot::default());
    }

    #[test]
    fn counters_accumulate() {
        let metrics = DispatchMetrics::new();
        metrics.record("msg", 0, Duration::from_millis(5));
        metrics.record("msg", 2, Duration::from_millis(7));

        let snapshot = metrics.snapshot("msg");
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.errors, 2);
        assert_eq!(snapshot.cumulative_time, Duration::from_millis(12));
    }
}

//! Per-provider availability bookkeeping.

/// Availability state for one provider.
///
/// Mutated only by the orchestrator's own call results: successes reset the
/// consecutive-error count, failures grow it, and crossing the configured
/// threshold marks the provider unavailable until an explicit health probe
/// succeeds.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Provider identifier, from its config.
    pub id: String,
    /// Whether the orchestrator will attempt this provider.
    pub available: bool,
    /// Failures since the last success.
    pub consecutive_errors: u32,
    /// Display form of the most recent failure.
    pub last_error: Option<String>,
}

impl ProviderStatus {
    /// Initializes an available status.
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            available: true,
            consecutive_errors: 0,
            last_error: None,
        }
    }

    /// Records a successful call.
    pub(crate) fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.last_error = None;
    }

    /// Records a failed call; trips the breaker at `threshold`.
    ///
    /// Returns true when this failure flipped the provider unavailable.
    pub(crate) fn record_failure(&mut self, error: String, threshold: u32) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error);
        if self.available && self.consecutive_errors >= threshold {
            self.available = false;
            return true;
        }
        false
    }

    /// Restores availability after a successful health probe.
    pub(crate) fn mark_available(&mut self) {
        self.available = true;
        self.consecutive_errors = 0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_trips_at_threshold() {
        let mut status = ProviderStatus::new("primary");
        assert!(!status.record_failure("e1".to_string(), 3));
        assert!(!status.record_failure("e2".to_string(), 3));
        assert!(status.record_failure("e3".to_string(), 3));
        assert!(!status.available);
        assert_eq!(status.consecutive_errors, 3);
    }

    #[test]
    fn success_resets_the_count() {
        let mut status = ProviderStatus::new("primary");
        status.record_failure("e1".to_string(), 3);
        status.record_failure("e2".to_string(), 3);
        status.record_success();
        assert_eq!(status.consecutive_errors, 0);
        assert!(status.available);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn probe_restores_availability() {
        let mut status = ProviderStatus::new("primary");
        for i in 0..3 {
            status.record_failure(format!("e{i}"), 3);
        }
        assert!(!status.available);

        status.mark_available();
        assert!(status.available);
        assert_eq!(status.consecutive_errors, 0);
    }
}

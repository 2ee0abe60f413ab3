//! Exponential reconnect backoff with jitter.

use std::time::Duration;

use crate::config::BackoffPolicy;

/// Tracks the growing delay between reconnect attempts.
///
/// Reset after every successful connection so a later drop starts the
/// schedule over from the initial delay.
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
    rng_state: u64,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        // Cheap xorshift seed; backoff jitter only needs to decorrelate
        // concurrent clients, not be unpredictable.
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0)
            | 1;
        Self {
            policy,
            attempt: 0,
            rng_state: seed,
        }
    }

    /// Returns how many attempts have been made since the last reset.
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Computes the delay for the next attempt and advances the counter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let exp = self.policy.multiplier.powi(self.attempt.min(32) as i32);
        let base = self.policy.initial_delay.as_secs_f64() * exp;
        let capped = base.min(self.policy.max_delay.as_secs_f64());

        let jittered = if self.policy.jitter > 0.0 {
            // Jitter in [1 - jitter, 1.0]: never longer than the cap.
            let unit = self.next_unit();
            capped * (1.0 - self.policy.jitter * unit)
        } else {
            capped
        };

        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Resets the schedule after a successful connection.
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }

    /// xorshift64 step mapped into [0, 1).
    fn next_unit(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let mut backoff = Backoff::new(policy(0.0));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut backoff = Backoff::new(policy(0.0));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(policy(0.25));
        for expected_max in [1.0f64, 2.0, 4.0] {
            let delay = backoff.next_delay().as_secs_f64();
            assert!(delay <= expected_max + f64::EPSILON);
            assert!(delay >= expected_max * 0.75 - f64::EPSILON);
        }
    }
}

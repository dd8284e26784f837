//! Reconnect backoff policy.
//!
//! Deterministic exponential growth with a capped maximum, plus
//! optional jitter so a fleet of clients does not reconnect in
//! lockstep against the backend.

use std::time::Duration;

use rand::Rng;

/// Policy translating a reconnect attempt number into a delay.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Base delay for the first retry (milliseconds).
    pub base_delay_ms: u64,
    /// Cap applied to the exponential growth (milliseconds).
    pub max_delay_ms: u64,
    /// Whether to randomize delays within [50%, 100%] of the computed
    /// value.
    pub jitter_enabled: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_enabled: true,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Builder: set the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Builder: enable/disable jitter.
    #[must_use]
    pub const fn with_jitter_enabled(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }

    /// Raw exponential delay for a 0-indexed attempt, before jitter.
    #[must_use]
    pub fn compute_delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.min(30);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        delay.min(self.max_delay_ms)
    }

    /// Delay for a 0-indexed attempt, with jitter applied when
    /// enabled. Never below half the computed delay, so consecutive
    /// failures still back off.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.compute_delay_ms(attempt);
        if !self.jitter_enabled {
            return Duration::from_millis(base);
        }
        let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        #[allow(clippy::cast_precision_loss)]
        let jittered = (base as f64 * factor) as u64;
        Duration::from_millis(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_strictly_increases_until_cap_then_holds() {
        let policy = ReconnectPolicy::new()
            .with_base_delay_ms(500)
            .with_max_delay_ms(8_000)
            .with_jitter_enabled(false);

        let delays: Vec<u64> = (0..8).map(|a| policy.compute_delay_ms(a)).collect();
        assert_eq!(delays, [500, 1_000, 2_000, 4_000, 8_000, 8_000, 8_000, 8_000]);

        for pair in delays.windows(2) {
            if pair[0] < 8_000 {
                assert!(pair[1] > pair[0], "growth below cap must be strict");
            } else {
                assert_eq!(pair[1], 8_000, "cap must hold");
            }
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = ReconnectPolicy::new().with_jitter_enabled(false);
        assert_eq!(policy.compute_delay_ms(u32::MAX), policy.max_delay_ms);
        assert_eq!(policy.compute_delay_ms(63), policy.max_delay_ms);
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let policy = ReconnectPolicy::new()
            .with_base_delay_ms(1_000)
            .with_max_delay_ms(30_000);

        for attempt in 0..6 {
            let raw = policy.compute_delay_ms(attempt);
            for _ in 0..32 {
                let jittered = policy.delay_for_attempt(attempt).as_millis() as u64;
                assert!(jittered >= raw / 2, "jitter below half of {raw}: {jittered}");
                assert!(jittered <= raw, "jitter above {raw}: {jittered}");
            }
        }
    }

    #[test]
    fn disabled_jitter_is_deterministic() {
        let policy = ReconnectPolicy::new().with_jitter_enabled(false);
        assert_eq!(
            policy.delay_for_attempt(3),
            policy.delay_for_attempt(3)
        );
    }

    #[test]
    fn no_busy_loop_on_first_retry() {
        let policy = ReconnectPolicy::default();
        assert!(policy.delay_for_attempt(0) >= Duration::from_millis(500));
    }
}

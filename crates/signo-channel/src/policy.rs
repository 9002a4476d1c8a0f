use std::time::Duration;

use crate::config::ChannelConfig;

/// Decides whether and when to retry after connectivity loss.
///
/// The delay for attempt `n` (zero-based) is `min(cap, base * multiplier^n)`.
/// The counter resets on every successful open and freezes at `max_attempts`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base: Duration,
    multiplier: f64,
    cap: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base: Duration, multiplier: f64, cap: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base,
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
            cap: cap.max(base),
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts,
            config.reconnect_interval(),
            config.backoff_multiplier,
            config.max_reconnect_interval(),
        )
    }

    /// Attempts scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True once no further attempts are allowed.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Delay for the zero-based attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap_secs = self.cap.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= cap_secs {
            self.cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay before the next attempt, counting it; `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn policy(max: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(
            max,
            Duration::from_millis(1_000),
            1.5,
            Duration::from_millis(10_000),
        )
    }

    #[test]
    fn delays_grow_then_cap() {
        let mut policy = policy(10);
        let delays: Vec<u128> = std::iter::from_fn(|| policy.next_delay())
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(
            delays,
            vec![1000, 1500, 2250, 3375, 5062, 7593, 10000, 10000, 10000, 10000]
        );
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut policy = policy(3);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn reset_restores_budget_and_base_delay() {
        let mut policy = policy(2);
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut policy = policy(0);
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn huge_attempt_numbers_stay_at_cap() {
        assert_eq!(policy(1).delay_for(u32::MAX), Duration::from_millis(10_000));
    }

    proptest! {
        #[test]
        fn delays_are_monotonic_and_capped(
            base_ms in 1u64..5_000,
            multiplier in 1.0f64..4.0,
            extra_cap_ms in 0u64..60_000,
            attempts in 1u32..40,
        ) {
            let cap = Duration::from_millis(base_ms + extra_cap_ms);
            let mut policy = ReconnectPolicy::new(
                attempts,
                Duration::from_millis(base_ms),
                multiplier,
                cap,
            );
            let mut previous = Duration::ZERO;
            while let Some(delay) = policy.next_delay() {
                prop_assert!(delay >= previous);
                prop_assert!(delay <= cap);
                previous = delay;
            }
            prop_assert_eq!(policy.attempts(), attempts);
        }
    }
}

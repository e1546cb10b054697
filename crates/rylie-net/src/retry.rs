//! Reconnect delay policies.
//!
//! Both policies retry forever; only the spacing between attempts differs.

use std::time::Duration;

use rylie_shared::constants::{
    DEFAULT_RETRY_DELAY_MS, DEFAULT_RETRY_JITTER, DEFAULT_RETRY_MAX_DELAY_MS,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Constant delay between attempts.
    Fixed { delay: Duration },
    /// `base * 2^(attempt-1)` capped at `max`, plus up to `jitter * delay`
    /// of random spread (still capped at `max`).
    Exponential {
        base: Duration,
        max: Duration,
        jitter: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            jitter: DEFAULT_RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }

    /// Same as [`delay_for`](Self::delay_for) with an explicit jitter sample
    /// in `[0, 1]`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter_unit: f64) -> Duration {
        match self {
            RetryPolicy::Fixed { delay } => *delay,
            RetryPolicy::Exponential { base, max, jitter } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let scaled = base.saturating_mul(1u32 << exponent).min(*max);
                let spread = scaled.mul_f64(jitter.max(0.0) * jitter_unit.clamp(0.0, 1.0));
                scaled.saturating_add(spread).min(*max)
            }
        }
    }

    /// Longest delay this policy can produce.
    pub fn max_delay(&self) -> Duration {
        match self {
            RetryPolicy::Fixed { delay } => *delay,
            RetryPolicy::Exponential { max, .. } => *max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_constant() {
        let policy = RetryPolicy::fixed(Duration::from_secs(3));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(50), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(4),
            jitter: 0.0,
        };
        assert_eq!(policy.delay_with_jitter(1, 0.0), Duration::from_millis(500));
        assert_eq!(policy.delay_with_jitter(2, 0.0), Duration::from_secs(1));
        assert_eq!(policy.delay_with_jitter(4, 0.0), Duration::from_secs(4));
        assert_eq!(policy.delay_with_jitter(40, 0.0), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: 0.5,
        };
        assert_eq!(policy.delay_with_jitter(1, 1.0), Duration::from_millis(1500));
        for attempt in 1..20 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= policy.max_delay());
        }
    }
}

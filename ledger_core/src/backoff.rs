//! Exponential backoff policy shared by every retried call.
//!
//! The policy is a plain value: the state machine in the executor asks it
//! two questions (how long to wait, may I try again) and owns the counters
//! itself. Tests drive it with a virtual clock.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default first wait.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default ceiling on a single wait.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Bounded exponential backoff: `min(base * multiplier^retry, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Wait before the first retry
    pub base_delay: Duration,
    
    /// Growth factor per retry
    pub multiplier: u32,
    
    /// Ceiling on a single wait
    pub max_delay: Duration,
    
    /// Total attempts allowed per call (`None` = retry until success)
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: 2,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Sets the first wait.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
    
    /// Sets the ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
    
    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }
    
    /// Bounds the number of attempts per call.
    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }
    
    /// Returns the wait after the `retry_count`-th failed retry.
    ///
    /// `retry_count` starts at 0 for the wait following the first failure,
    /// so the default policy yields 100ms, 200ms, 400ms, ... 10s, 10s.
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.multiplier
            .checked_pow(retry_count)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |wait| wait.min(self.max_delay))
    }
    
    /// Returns true if another attempt may follow `attempts_made` attempts.
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }
    
    /// Returns true if the policy never gives up.
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    
    #[test]
    fn test_default_schedule() {
        let policy = BackoffPolicy::default();
        
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(6), Duration::from_millis(6400));
        
        // Capped from here on
        assert_eq!(policy.delay(7), Duration::from_secs(10));
        assert_eq!(policy.delay(8), Duration::from_secs(10));
        assert_eq!(policy.delay(500), Duration::from_secs(10));
    }
    
    #[test]
    fn test_unbounded_by_default() {
        let policy = BackoffPolicy::default();
        assert!(policy.is_unbounded());
        assert!(policy.allows_attempt(u32::MAX - 1));
    }
    
    #[test]
    fn test_max_attempts() {
        let policy = BackoffPolicy::default().with_max_attempts(Some(3));
        assert!(policy.allows_attempt(0));
        assert!(policy.allows_attempt(2));
        assert!(!policy.allows_attempt(3));
    }
    
    #[test]
    fn test_sub_millisecond_base_keeps_growing() {
        let policy = BackoffPolicy::default().with_base_delay(Duration::from_micros(500));
        
        assert_eq!(policy.delay(0), Duration::from_micros(500));
        assert_eq!(policy.delay(1), Duration::from_millis(1));
        assert_eq!(policy.delay(2), Duration::from_millis(2));
        assert_eq!(policy.delay(3), Duration::from_millis(4));
    }
    
    #[test]
    fn test_overflow_saturates_at_cap() {
        let policy = BackoffPolicy::default().with_multiplier(u32::MAX);
        assert_eq!(policy.delay(3), policy.max_delay);
    }
    
    proptest! {
        #[test]
        fn prop_delay_monotonic_until_cap(base_us in 1u64..1_000_000, cap_us in 1u64..60_000_000, retry in 0u32..64) {
            let policy = BackoffPolicy::default()
                .with_base_delay(Duration::from_micros(base_us))
                .with_max_delay(Duration::from_micros(cap_us));
            
            let current = policy.delay(retry);
            let next = policy.delay(retry + 1);
            
            prop_assert!(current <= policy.max_delay);
            if current < policy.max_delay {
                prop_assert!(next > current);
            } else {
                prop_assert_eq!(next, current);
            }
        }
    }
}

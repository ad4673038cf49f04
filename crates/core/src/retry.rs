//! Retry policy with exponential backoff
//!
//! The policy is plain data so callers can inject it:
//! - Production matting calls use [`RetryConfig::default`] (3 attempts, 2s then 4s)
//! - Tests use [`RetryConfig::no_delay`] to keep the attempt budget without sleeping
//!
//! The delay before retry `n` (1-based count of failed attempts) is
//! `initial_delay * backoff_multiplier^(n - 1)`, capped at `max_delay`.
//!
//! # Example
//!
//! ```rust
//! use backdrop_core::retry::RetryConfig;
//! use std::time::Duration;
//!
//! let policy = RetryConfig::default();
//! assert_eq!(
//!     policy.backoff_schedule(),
//!     vec![Duration::from_secs(2), Duration::from_secs(4)]
//! );
//! ```

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Keep the attempt budget but never sleep
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self::no_delay(1)
    }

    /// Builder-style method to set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Calculate the delay to wait after `failed_attempts` failures
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(failed_attempts - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()))
    }

    /// Delays slept between attempts when every attempt is retryable.
    ///
    /// There is no delay after the final attempt, so the schedule has
    /// `max_attempts - 1` entries.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|failed| self.delay_for_attempt(failed))
            .collect()
    }

    /// Worst-case total sleep across the whole budget
    pub fn worst_case_backoff(&self) -> Duration {
        self.backoff_schedule().into_iter().sum()
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfigValue,
                "retry max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::new(
                ErrorCode::InvalidConfigValue,
                "retry backoff_multiplier must be a finite value >= 1.0",
            ));
        }
        Ok(())
    }
}

/// Retry result with attempt information
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// The successful result
    pub value: T,
    /// Number of attempts made
    pub attempts: u32,
    /// Total time spent sleeping between attempts
    pub total_backoff: Duration,
}

impl<T> RetryResult<T> {
    /// Transform the carried value, keeping attempt statistics
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RetryResult<U> {
        RetryResult {
            value: f(self.value),
            attempts: self.attempts,
            total_backoff: self.total_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_two_then_four_seconds() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.worst_case_backoff(), Duration::from_secs(6));
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(3),
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(3));
    }

    #[test]
    fn test_delays_are_deterministic() {
        let config = RetryConfig::default();
        for failed in 1..=4 {
            assert_eq!(config.delay_for_attempt(failed), config.delay_for_attempt(failed));
        }
        assert_eq!(
            config.backoff_schedule(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_no_delay_keeps_budget() {
        let config = RetryConfig::no_delay(3);
        assert_eq!(config.max_attempts, 3);
        assert!(config.backoff_schedule().iter().all(|d| d.is_zero()));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        assert!(RetryConfig::default().with_max_attempts(0).validate().is_err());
        assert!(RetryConfig::no_retry().validate().is_ok());
    }

    #[test]
    fn test_retry_result_map() {
        let result = RetryResult {
            value: 2,
            attempts: 3,
            total_backoff: Duration::from_secs(6),
        };
        let mapped = result.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.attempts, 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn schedule_never_shrinks_and_respects_cap(
                attempts in 1u32..12,
                initial_ms in 0u64..5_000,
                cap_ms in 0u64..60_000,
                multiplier in 1.0f64..4.0,
            ) {
                let config = RetryConfig {
                    max_attempts: attempts,
                    initial_delay: Duration::from_millis(initial_ms),
                    max_delay: Duration::from_millis(cap_ms),
                    backoff_multiplier: multiplier,
                };
                let schedule = config.backoff_schedule();

                prop_assert_eq!(schedule.len(), attempts as usize - 1);
                prop_assert!(schedule.iter().all(|d| *d <= config.max_delay));
                prop_assert!(schedule.windows(2).all(|pair| pair[0] <= pair[1]));
            }
        }
    }
}

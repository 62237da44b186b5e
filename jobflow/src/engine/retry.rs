//! Retry policy with configurable backoff and jitter strategies.
//!
//! Attempt numbers are 0-indexed: attempt 0 is the initial try and never
//! waits; attempt `k >= 1` waits `backoff(k)` before starting.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * attempt
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay in milliseconds.
    #[must_use]
    pub fn apply(&self, delay_ms: u64) -> u64 {
        match self {
            Self::None => delay_ms,
            Self::Full => {
                if delay_ms == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay_ms)
                }
            }
            Self::Equal => {
                let half = delay_ms / 2;
                if half == 0 {
                    delay_ms
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay unit in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
    /// Whether pipeline cancellation interrupts the backoff sleep.
    #[serde(default = "default_cancellable_backoff")]
    pub cancellable_backoff: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_cancellable_backoff() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::None,
            cancellable_backoff: default_cancellable_backoff(),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retries after the initial attempt.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Sets whether cancellation interrupts backoff sleeps.
    #[must_use]
    pub fn with_cancellable_backoff(mut self, cancellable: bool) -> Self {
        self.cancellable_backoff = cancellable;
        self
    }

    /// Total attempts a job may make (initial + retries).
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns true if `attempt` (0-indexed) is the last one allowed.
    #[must_use]
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }

    /// Backoff before `attempt`, before jitter. Attempt 0 never waits.
    #[must_use]
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.base_delay_ms;
        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(attempt)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Constant => base,
        };

        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Backoff before `attempt`, with jitter applied.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        if delay.is_zero() {
            return delay;
        }
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.jitter_strategy.apply(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_strategy_default() {
        assert_eq!(BackoffStrategy::default(), BackoffStrategy::Exponential);
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.jitter_strategy, JitterStrategy::None);
        assert!(config.cancellable_backoff);
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_max_retries(5)
            .with_base_delay_ms(500)
            .with_max_delay_ms(10000)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::Full)
            .with_cancellable_backoff(false);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 10000);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Linear);
        assert_eq!(config.jitter_strategy, JitterStrategy::Full);
        assert!(!config.cancellable_backoff);
    }

    #[test]
    fn test_first_attempt_has_no_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn test_default_exponential_doubles_per_attempt() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_linear_and_constant() {
        let linear = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear);
        assert_eq!(linear.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(linear.delay_for_attempt(3), Duration::from_millis(300));

        let constant = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(constant.delay_for_attempt(5), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000);

        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_full_jitter_bounds() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::Full);

        for _ in 0..100 {
            assert!(config.delay_for_attempt(1) <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        for _ in 0..100 {
            let jittered = JitterStrategy::Equal.apply(1000);
            assert!((500..=1000).contains(&jittered));
        }
    }

    #[test]
    fn test_is_last_attempt() {
        let config = RetryConfig::new().with_max_retries(2);
        assert!(!config.is_last_attempt(0));
        assert!(!config.is_last_attempt(1));
        assert!(config.is_last_attempt(2));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Exponential);
    }
}

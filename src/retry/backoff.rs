//! Backoff strategies
//!
//! A [`BackoffMethod`] answers one question: how long to wait before a given
//! attempt. Implementations are pure, the same attempt always maps to the
//! same delay.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default number of attempts when none is configured
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Milliseconds per Fibonacci step
const FIBONACCI_UNIT_MS: u64 = 1000;

/// Attempt limits shared by every backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffOptions {
    initial_delay: Duration,
    max_attempts: u32,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffOptions {
    /// `max_attempts` is raised to 1 if zero.
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Defaults with every field set in `overrides` replaced
    pub fn merged(overrides: &BackoffOverrides) -> Self {
        let defaults = Self::default();
        Self::new(
            overrides
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            overrides.max_attempts.unwrap_or(defaults.max_attempts),
        )
    }

    /// Delay before the first attempt
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Caller-supplied subset of [`BackoffOptions`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Delay policy between attempts
pub trait BackoffMethod: fmt::Debug + Send + Sync {
    fn options(&self) -> &BackoffOptions;

    /// Delay to wait before `attempt` (1-based)
    fn calculate_backoff(&self, attempt: u32) -> Duration;

    /// Delays the retry driver waits between attempts when every attempt
    /// fails, i.e. the backoff before attempts `2..=max_attempts`
    ///
    /// Lazy: `max_attempts` can be as large as `u32::MAX`.
    fn schedule(&self) -> Box<dyn Iterator<Item = Duration> + '_> {
        Box::new(
            (2..=self.options().max_attempts()).map(move |attempt| self.calculate_backoff(attempt)),
        )
    }
}

/// Waits the same amount of time before every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBackoff {
    options: BackoffOptions,
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(options: BackoffOptions, delay: Duration) -> Self {
        Self { options, delay }
    }
}

impl BackoffMethod for FixedBackoff {
    fn options(&self) -> &BackoffOptions {
        &self.options
    }

    fn calculate_backoff(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Waits `fibonacci(attempt + offset)` seconds, optionally capped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    options: BackoffOptions,
    max_delay: Option<Duration>,
    offset: u32,
}

impl FibonacciBackoff {
    pub fn new(options: BackoffOptions, max_delay: Option<Duration>, offset: u32) -> Self {
        Self {
            options,
            max_delay,
            offset,
        }
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl BackoffMethod for FibonacciBackoff {
    fn options(&self) -> &BackoffOptions {
        &self.options
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let steps = fibonacci(attempt.saturating_add(self.offset));
        let delay = Duration::from_millis(steps.saturating_mul(FIBONACCI_UNIT_MS));
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Fibonacci number with `fibonacci(0) == fibonacci(1) == 1`.
///
/// Saturates at `u64::MAX` instead of overflowing.
pub fn fibonacci(n: u32) -> u64 {
    let (mut previous, mut current) = (1u64, 1u64);
    for _ in 1..n {
        if current == u64::MAX {
            break;
        }
        let next = previous.saturating_add(current);
        previous = current;
        current = next;
    }
    current
}

/// Serializable choice of backoff strategy
///
/// ```json
/// { "method": "fibonacci", "max_delay_ms": 30000 }
/// { "method": "fixed", "delay_ms": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum BackoffConfig {
    Fixed {
        delay_ms: u64,
    },
    Fibonacci {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_delay_ms: Option<u64>,
        #[serde(default)]
        offset: u32,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Fibonacci {
            max_delay_ms: Some(30_000),
            offset: 0,
        }
    }
}

impl BackoffConfig {
    pub fn build(&self, options: BackoffOptions) -> Box<dyn BackoffMethod> {
        match *self {
            Self::Fixed { delay_ms } => {
                Box::new(FixedBackoff::new(options, Duration::from_millis(delay_ms)))
            }
            Self::Fibonacci {
                max_delay_ms,
                offset,
            } => Box::new(FibonacciBackoff::new(
                options,
                max_delay_ms.map(Duration::from_millis),
                offset,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_default_options() {
        let options = BackoffOptions::default();
        assert_eq!(options.initial_delay(), Duration::ZERO);
        assert_eq!(options.max_attempts(), 10);
    }

    #[test]
    fn test_overrides_are_shallow_merged() {
        let options = BackoffOptions::merged(&BackoffOverrides {
            max_attempts: Some(3),
            ..BackoffOverrides::default()
        });
        assert_eq!(options.max_attempts(), 3);
        assert_eq!(options.initial_delay(), Duration::ZERO);

        let options = BackoffOptions::merged(&BackoffOverrides {
            initial_delay_ms: Some(250),
            max_attempts: None,
        });
        assert_eq!(options.initial_delay(), Duration::from_millis(250));
        assert_eq!(options.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(BackoffOptions::new(Duration::ZERO, 0).max_attempts(), 1);
    }

    #[test]
    fn test_fibonacci_sequence() {
        let values: Vec<u64> = (0..8).map(fibonacci).collect();
        assert_eq!(values, vec![1, 1, 2, 3, 5, 8, 13, 21]);
    }

    #[test]
    fn test_fibonacci_saturates() {
        assert_eq!(fibonacci(u32::MAX), u64::MAX);
        assert_eq!(fibonacci(200), u64::MAX);
    }

    #[test]
    fn test_fibonacci_backoff_values() {
        let backoff = FibonacciBackoff::new(BackoffOptions::default(), None, 0);
        let delays: Vec<Duration> = (1..=5).map(|a| backoff.calculate_backoff(a)).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(3), secs(5), secs(8)]);
    }

    #[test]
    fn test_fibonacci_offset_shifts_sequence() {
        let backoff = FibonacciBackoff::new(BackoffOptions::default(), None, 2);
        assert_eq!(backoff.calculate_backoff(1), secs(3));
        assert_eq!(backoff.calculate_backoff(2), secs(5));
    }

    #[test]
    fn test_fibonacci_ceiling() {
        let backoff = FibonacciBackoff::new(BackoffOptions::default(), Some(secs(4)), 0);
        assert_eq!(backoff.calculate_backoff(3), secs(3));
        assert_eq!(backoff.calculate_backoff(4), secs(4));
        assert_eq!(backoff.calculate_backoff(50), secs(4));
    }

    #[test]
    fn test_schedule_covers_retries_only() {
        let backoff = FibonacciBackoff::new(BackoffOptions::new(Duration::ZERO, 4), None, 0);
        assert_eq!(
            backoff.schedule().collect::<Vec<_>>(),
            vec![secs(2), secs(3), secs(5)]
        );

        let single = FixedBackoff::new(BackoffOptions::new(Duration::ZERO, 1), secs(1));
        assert_eq!(single.schedule().count(), 0);
    }

    #[test]
    fn test_schedule_is_lazy_for_huge_attempt_limits() {
        let backoff = FixedBackoff::new(BackoffOptions::new(Duration::ZERO, u32::MAX), secs(1));
        let mut schedule = backoff.schedule();

        assert_eq!(schedule.size_hint().0, u32::MAX as usize - 1);
        assert_eq!(schedule.nth(1_000), Some(secs(1)));
    }

    #[test]
    fn test_config_builds_methods() {
        let json = r#"{"method":"fixed","delay_ms":500}"#;
        let config: BackoffConfig = serde_json::from_str(json).unwrap();
        let method = config.build(BackoffOptions::default());
        assert_eq!(method.calculate_backoff(7), Duration::from_millis(500));

        let json = r#"{"method":"fibonacci"}"#;
        let config: BackoffConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            BackoffConfig::Fibonacci {
                max_delay_ms: None,
                offset: 0
            }
        );
        let method = config.build(BackoffOptions::default());
        assert_eq!(method.calculate_backoff(5), secs(8));
    }

    proptest! {
        #[test]
        fn test_fixed_is_constant(delay_ms in 0u64..1_000_000, attempt in 1u32..10_000) {
            let backoff = FixedBackoff::new(BackoffOptions::default(), Duration::from_millis(delay_ms));
            prop_assert_eq!(backoff.calculate_backoff(attempt), Duration::from_millis(delay_ms));
        }

        #[test]
        fn test_fibonacci_never_exceeds_ceiling(
            max_ms in 0u64..120_000,
            offset in 0u32..50,
            attempt in 1u32..10_000,
        ) {
            let max = Duration::from_millis(max_ms);
            let backoff = FibonacciBackoff::new(BackoffOptions::default(), Some(max), offset);
            prop_assert!(backoff.calculate_backoff(attempt) <= max);
        }

        #[test]
        fn test_fibonacci_is_pure(attempt in 1u32..200, offset in 0u32..20) {
            let backoff = FibonacciBackoff::new(BackoffOptions::default(), None, offset);
            let first = backoff.calculate_backoff(attempt);
            let _ = backoff.calculate_backoff(attempt + 1);
            prop_assert_eq!(backoff.calculate_backoff(attempt), first);
        }
    }
}

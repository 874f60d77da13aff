//! Inter-attempt delays: fixed, or exponential with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::{RetryConfig, RetryStrategy};

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay applied after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed(Duration),
    Exponential { base_ms: u64, max_ms: u64 },
}

impl BackoffStrategy {
    pub fn from_config(config: &RetryConfig) -> Self {
        match config.strategy {
            RetryStrategy::Fixed => Self::Fixed(Duration::from_millis(config.base_delay_ms)),
            RetryStrategy::Exponential => Self::Exponential {
                base_ms: config.base_delay_ms,
                max_ms: config.max_delay_ms,
            },
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base_ms, max_ms } => calculate_backoff(attempt, base_ms, max_ms),
        }
    }
}

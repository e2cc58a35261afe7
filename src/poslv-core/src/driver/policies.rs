// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reconnect delay policies.
//!
//! The supervisor retries forever; a policy only decides how long to wait
//! before the next attempt.

use std::time::Duration;

/// Policy for spacing reconnect attempts.
pub trait RetryPolicy: Send + Sync {
    /// Delay before the next attempt, given the number of consecutive
    /// failures so far (starting at 1).
    fn delay(&self, failures: u32) -> Duration;
}

/// Fixed delay retry policy.
///
/// Uses a constant delay between retry attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RetryPolicy for FixedDelay {
    fn delay(&self, _failures: u32) -> Duration {
        self.delay
    }
}

/// Exponential backoff retry policy.
///
/// Delays double with each consecutive failure, up to a configured maximum.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay(&self, failures: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(failures.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(multiplier);
        delay.min(self.max_delay)
    }
}

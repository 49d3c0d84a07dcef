//! Exponential backoff between fetch attempts

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::defaults::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    MAX_ATTEMPTS_CEILING, MAX_DELAY_MS,
};

/// Retry schedule for one endpoint.
///
/// The delay after failed attempt `n` (1-based) is
/// `base_delay_ms * multiplier^(n-1)`, capped at `MAX_DELAY_MS`. No delay
/// follows the last attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BackoffPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            multiplier,
        }
    }

    /// Copy of this policy clamped into the hard ceilings.
    pub fn bounded(&self) -> Self {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        Self {
            max_attempts: self.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING),
            base_delay_ms: self.base_delay_ms.min(MAX_DELAY_MS),
            multiplier,
        }
    }

    /// Sleep before attempt `attempt + 1`, given that `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_ATTEMPTS_CEILING) as i32;
        let ms = self.base_delay_ms as f64 * self.multiplier.powi(exp);
        let ms = if ms.is_finite() { ms } else { MAX_DELAY_MS as f64 };
        Duration::from_millis((ms.round() as u64).min(MAX_DELAY_MS))
    }

    /// Every sleep the policy can produce, in order.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|n| self.delay_for(n)).collect()
    }

    /// Sum of all sleeps when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

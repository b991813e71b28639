// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Exponential backoff with jitter for the introspection listen loop.
//!
//! There is no retry limit: the listener keeps retrying for as long as the
//! daemon runs, so the policy only decides how long to wait.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for retry backoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry (ms).
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    /// Maximum delay cap (ms).
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Growth factor applied after every failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter fraction (0.0 - 1.0) applied symmetrically around the interval.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_min_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffConfig {
    /// Create with custom minimum and maximum delays.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min_ms: saturating_millis(min),
            max_ms: saturating_millis(max),
            ..Default::default()
        }
    }

    /// Set the growth multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_ms == 0 {
            return Err(ConfigError::InvalidValue("backoff min_ms cannot be 0".into()));
        }
        if self.max_ms < self.min_ms {
            return Err(ConfigError::InvalidValue(
                "backoff max_ms must be >= min_ms".into(),
            ));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "backoff multiplier must be >= 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidValue(
                "backoff jitter must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Backoff state for one retry episode.
///
/// `current` always stays within `[min_ms, max_ms]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current_ms: u64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_ms: config.min_ms,
            config,
        }
    }

    /// Interval the next delay is computed from, before jitter.
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Delay to wait before the next attempt.
    ///
    /// Returns the current interval perturbed by up to `± jitter × interval`
    /// and advances the interval to `min(max, interval × multiplier)`.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current_ms;
        self.current_ms = self.grow(base);
        Duration::from_millis(self.jittered(base))
    }

    /// Return to the minimum interval.
    pub fn reset(&mut self) {
        self.current_ms = self.config.min_ms;
    }

    fn grow(&self, interval_ms: u64) -> u64 {
        let next = interval_ms as f64 * self.config.multiplier;
        (next.min(self.config.max_ms as f64) as u64).max(self.config.min_ms)
    }

    fn jittered(&self, interval_ms: u64) -> u64 {
        let spread = interval_ms as f64 * self.config.jitter;
        if spread < 1.0 {
            return interval_ms;
        }
        let offset = (fastrand::f64() * 2.0 - 1.0) * spread;
        ((interval_ms as f64 + offset).round() as u64)
            .min(self.config.max_ms)
            .max(self.config.min_ms)
    }
}

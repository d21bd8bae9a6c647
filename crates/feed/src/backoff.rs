//! Reconnect delay policy

use std::time::Duration;

use idsfeed_config::BackoffConfig;

/// Delay schedule between reconnect attempts.
pub trait BackoffPolicy: Send {
    /// Delay before the next attempt. Advances the schedule.
    fn next_delay(&mut self) -> Duration;

    /// Called after a successful connection
    fn reset(&mut self);
}

/// Exponential backoff with a ceiling
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(min: Duration, max: Duration, multiplier: f64) -> Self {
        let max = max.max(min);
        let multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        Self {
            min,
            max,
            multiplier,
            current: min,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.min(), config.max(), config.multiplier)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.min;
    }
}

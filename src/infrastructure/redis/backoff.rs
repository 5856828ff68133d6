//! Reconnect delays for the Pub/Sub subscriber loop

use std::time::Duration;

use rand::Rng;

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Exponential reconnect delay with jitter.
///
/// Only the subscription connection backs off. Dispatch of an individual
/// event is never retried here.
pub struct ReconnectBackoff {
    config: BackoffConfig,
    current_delay_ms: u64,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms;
        Self {
            config,
            current_delay_ms: initial,
            attempt: 0,
        }
    }

    /// Delay before the next reconnect attempt
    pub fn next_delay(&mut self) -> Duration {
        let base = if self.attempt == 0 {
            self.config.initial_delay_ms as f64
        } else {
            self.current_delay_ms as f64 * self.config.multiplier
        };
        self.attempt += 1;

        let capped = base.min(self.config.max_delay_ms as f64);
        let delay = if self.config.jitter_factor > 0.0 {
            let range = capped * self.config.jitter_factor;
            (capped + rand::rng().random_range(-range..=range)).max(1.0)
        } else {
            capped.max(1.0)
        };

        self.current_delay_ms = capped as u64;
        Duration::from_millis(delay as u64)
    }

    /// Called once a subscription is established again
    pub fn reset(&mut self) {
        self.current_delay_ms = self.config.initial_delay_ms;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_growth_and_cap() {
        let mut backoff = ReconnectBackoff::with_config(no_jitter());
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
        assert_eq!(backoff.attempt(), 6);
    }

    #[test]
    fn test_reset() {
        let mut backoff = ReconnectBackoff::with_config(no_jitter());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut backoff = ReconnectBackoff::new();
        let first = backoff.next_delay().as_millis() as u64;
        assert!((450..=550).contains(&first));
    }
}

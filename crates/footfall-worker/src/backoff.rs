//! Reconnect backoff policy.

use std::time::Duration;

use footfall_models::CameraOptions;

/// Exponential reconnect delays with a cap and an attempt limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_options(&CameraOptions::default())
    }
}

impl ReconnectPolicy {
    pub fn from_options(options: &CameraOptions) -> Self {
        Self {
            base_delay: Duration::from_millis(options.reconnect_base_delay_ms),
            multiplier: options.reconnect_multiplier,
            max_delay: Duration::from_millis(options.reconnect_max_delay_ms),
            max_attempts: options.max_reconnect_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `min(max_delay, base_delay * multiplier^(attempt - 1))`, or `None`
    /// once `attempt` exceeds `max_attempts`.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(capped.round() as u64))
    }

    /// Every delay the policy will hand out, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).filter_map(|a| self.delay_for(a)).collect()
    }
}

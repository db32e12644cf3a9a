//! Gateway settings

use std::time::Duration;

/// Tuning for one named operation.
///
/// The defaults follow conventional circuit-breaker tuning: a one-second
/// deadline, ten concurrent calls, and a breaker that opens at a 50% error
/// rate once twenty outcomes are on record within a ten-second window,
/// probing again after five seconds.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Deadline for a single invocation
    pub timeout: Duration,

    /// Concurrency ceiling per operation name
    pub max_concurrent: usize,

    /// Minimum outcomes in the window before the error rate is evaluated
    pub request_volume_threshold: u32,

    /// Error percentage (0-100) at which the breaker opens
    pub error_percent_threshold: u8,

    /// How long the breaker stays open before admitting a trial call
    pub sleep_window: Duration,

    /// Width of the rolling statistics window
    pub rolling_window: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            max_concurrent: 10,
            request_volume_threshold: 20,
            error_percent_threshold: 50,
            sleep_window: Duration::from_secs(5),
            rolling_window: Duration::from_secs(10),
        }
    }
}

impl GatewaySettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_request_volume_threshold(mut self, threshold: u32) -> Self {
        self.request_volume_threshold = threshold;
        self
    }

    pub fn with_error_percent_threshold(mut self, percent: u8) -> Self {
        self.error_percent_threshold = percent;
        self
    }

    pub fn with_sleep_window(mut self, window: Duration) -> Self {
        self.sleep_window = window;
        self
    }

    pub fn with_rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = window;
        self
    }
}

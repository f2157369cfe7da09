//! Log suppression for repeated failures.
//!
//! Long-running loops (frame pumps, detection ticks, publisher submissions)
//! fail the same way many times in a row when a dependency is down. The
//! tracker lets the first few failures through and then logs once that the
//! rest are suppressed, until the next success.

use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct FailureTracker {
    operation: &'static str,
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(operation: &'static str, max_logged_failures: u32) -> Self {
        Self {
            operation,
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    pub fn record_success(&mut self) {
        if self.suppressed {
            info!(
                operation = self.operation,
                failures = self.consecutive_failures,
                "Recovered after consecutive failures"
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if !self.suppressed {
            self.suppressed = true;
            warn!(
                operation = self.operation,
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

use std::time::Duration;

use crate::VirtualTime;

/// Runtime configuration for a [`Harness`](crate::Harness).
///
/// Controls the wall-clock watchdog and the virtual settle margin. Use the
/// builder pattern to customize, or use [`Default`] for sensible defaults.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use metronome::HarnessConfig;
///
/// let config = HarnessConfig::default()
///     .with_watchdog(Duration::from_millis(250))  // Fail fast on hangs
///     .with_settle_margin(500);                   // Generous post-input slack
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HarnessConfig {
    /// Wall-clock bound on the run phase. If scheduled activity (including
    /// cross-thread operations) has not reached quiescence within this
    /// duration, the run fails with a harness-level assertion failure
    /// instead of hanging the suite.
    /// Default: 1 second
    watchdog: Duration,

    /// Virtual ticks added past the latest declared event time before the
    /// clock stops advancing, so trailing activity (delays, teardowns) still
    /// runs.
    /// Default: 100
    settle_margin: VirtualTime,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            watchdog: Duration::from_secs(1),
            settle_margin: 100,
        }
    }
}

impl HarnessConfig {
    /// Set the wall-clock watchdog for the run phase.
    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Returns the wall-clock watchdog for the run phase.
    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    /// Set the virtual settle margin added to the run horizon.
    pub fn with_settle_margin(mut self, margin: VirtualTime) -> Self {
        self.settle_margin = margin;
        self
    }

    /// Returns the virtual settle margin added to the run horizon.
    pub fn settle_margin(&self) -> VirtualTime {
        self.settle_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let config = HarnessConfig::default();
        assert_eq!(config.watchdog(), Duration::from_secs(1));
        assert_eq!(config.settle_margin(), 100);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = HarnessConfig::default()
            .with_watchdog(Duration::from_millis(50))
            .with_settle_margin(10);
        assert_eq!(config.watchdog(), Duration::from_millis(50));
        assert_eq!(config.settle_margin(), 10);
    }
}

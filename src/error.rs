use std::time::Duration;

/// The single error type for all metronome operations.
///
/// Every fallible metronome API returns `metronome::Result<T>` (alias for
/// `Result<T, metronome::Error>`). Both variants are declaration- or
/// run-level problems with the test itself; expectation mismatches are never
/// errors and surface as [`AssertionResult::Failure`](crate::AssertionResult)
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An input event was declared with the wildcard time. Inputs must be
    /// scheduled at concrete ticks; the wildcard only makes sense in
    /// expected events.
    #[error("input events must carry a concrete time; event at index {index} uses the wildcard time")]
    WildcardInput {
        /// Position of the offending event in the declared sequence.
        index: usize,
    },

    /// The virtual clock could not reach quiescence within the wall-clock
    /// watchdog. Carries the configured timeout and the number of scheduled
    /// actions plus in-flight cross-thread operations still outstanding.
    #[error("virtual clock failed to settle within {0:?}: {1} action(s) or operation(s) still pending")]
    SettleTimeout(Duration, usize),
}

use std::fmt;

/// A source-code position, captured via `#[track_caller]` at the call site
/// of a terminal assertion operation (or at harness creation, for
/// harness-level failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    file: &'static str,
    line: u32,
}

impl Location {
    #[track_caller]
    pub(crate) fn caller() -> Self {
        let caller = std::panic::Location::caller();
        Location {
            file: caller.file(),
            line: caller.line(),
        }
    }

    /// Source file of the declaration.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Line of the declaration.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The outcome of one declared assertion.
///
/// Exactly one result is produced per assertion, in declaration order.
/// Results either reach the default reporting sink (which panics with every
/// failure listed) or the completion handler passed to
/// [`Harness::run_with`](crate::Harness::run_with).
#[derive(Debug, Clone)]
pub enum AssertionResult {
    /// The configured predicate held (after negation).
    Success {
        /// Where the assertion was declared.
        location: Location,
    },
    /// The configured predicate did not hold (after negation), or the run
    /// itself failed (watchdog expiry).
    Failure {
        /// Rendered diagnosis, including both event sequences where
        /// applicable.
        message: String,
        /// Where the assertion was declared.
        location: Location,
    },
}

impl AssertionResult {
    /// Returns true for [`AssertionResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, AssertionResult::Success { .. })
    }

    /// Returns true for [`AssertionResult::Failure`].
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The declaration site.
    pub fn location(&self) -> Location {
        match self {
            AssertionResult::Success { location } => *location,
            AssertionResult::Failure { location, .. } => *location,
        }
    }

    /// The failure message, if this is a failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            AssertionResult::Success { .. } => None,
            AssertionResult::Failure { message, .. } => Some(message),
        }
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionResult::Success { location } => write!(f, "passed at {location}"),
            AssertionResult::Failure { message, location } => {
                write!(f, "failed at {location}: {message}")
            }
        }
    }
}

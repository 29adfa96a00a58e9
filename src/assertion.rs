use std::{
    fmt,
    ops::Range,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    any,
    clock::VirtualClock,
    outcome::{AssertionResult, Location},
    recorded::{display_sequence, sequence_contains, sequences_equal},
    recording::Recording,
    source::{Source, Subscription},
    Element, Recorded, VirtualTime, ANY_TIME,
};

/// Shared element comparison, defaulting to `==` and overridable per
/// assertion for payload types without a usable `PartialEq`.
type ElementEq<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

type EventPredicate<T> = Arc<dyn Fn(&Recorded<T>) -> bool + Send + Sync>;

type SequencePredicate<T> = Arc<dyn Fn(&[Recorded<T>]) -> bool + Send + Sync>;

/// The full time window: every concrete tick from 0 up.
fn full_window() -> Range<VirtualTime> {
    0..VirtualTime::MAX
}

/// Order-preserving event filter.
///
/// Keeps an event when it passes the kind filter (`only_next`) and its time
/// falls inside `window`, except that wildcard-time events always survive:
/// the wildcard is outside of time, not a value to range-check. Filtering
/// the same sequence twice with the same configuration yields the same
/// result.
pub(crate) fn filter_events<T: Element>(
    events: &[Recorded<T>],
    window: &Range<VirtualTime>,
    only_next: bool,
) -> Vec<Recorded<T>> {
    events
        .iter()
        .filter(|event| {
            (!only_next || event.is_next())
                && (event.time == ANY_TIME || window.contains(&event.time))
        })
        .cloned()
        .collect()
}

enum Check<T> {
    Equal {
        expected: Vec<Recorded<T>>,
        eq: ElementEq<T>,
    },
    Contains {
        target: Recorded<T>,
        eq: ElementEq<T>,
    },
    ContainsWhere {
        predicate: EventPredicate<T>,
    },
    Count {
        expected: usize,
    },
    Empty,
    Verify {
        predicate: SequencePredicate<T>,
    },
}

struct AssertionState<T: Element> {
    source: Box<dyn Source<T> + Send>,
    window: Range<VirtualTime>,
    only_next: bool,
    negated: bool,
    dispose_at: Option<VirtualTime>,
    message: Option<String>,
    check: Option<Check<T>>,
    declared_at: Location,
    verdict_at: Location,
    recording: Option<Recording<T>>,
}

/// A pending comparison against one observed source.
///
/// Returned by [`Harness::expect`](crate::Harness::expect). Configure it
/// with the fluent filters, then pick exactly one terminal operation; the
/// comparison itself runs during the harness's run phase, against everything
/// the source emitted.
///
/// Filters narrow *both* the recorded and the expected sequence before the
/// predicate applies. [`not`](Assertion::not) inverts the predicate's full
/// boolean outcome (including length mismatches) and never affects
/// filtering.
///
/// ```ignore
/// h.expect(&output).filter_next().since(200).count(1);
/// h.expect(&output).equal(vec![next(100, "A"), any("B")]);
/// h.expect(&errors).not().is_empty();
/// ```
pub struct Assertion<T: Element> {
    state: Arc<Mutex<AssertionState<T>>>,
}

impl<T: Element> Assertion<T> {
    pub(crate) fn new(source: Box<dyn Source<T> + Send>, declared_at: Location) -> Self {
        Assertion {
            state: Arc::new(Mutex::new(AssertionState {
                source,
                window: full_window(),
                only_next: false,
                negated: false,
                dispose_at: None,
                message: None,
                check: None,
                declared_at,
                verdict_at: declared_at,
                recording: None,
            })),
        }
    }

    /// The harness-side, type-erased view of this assertion.
    pub(crate) fn erased(&self) -> Box<dyn AnyAssertion> {
        Box::new(AssertionHandle(Arc::clone(&self.state)))
    }

    fn lock(&self) -> MutexGuard<'_, AssertionState<T>> {
        self.state.lock().expect("assertion state poisoned")
    }

    // ==================== Filters ====================

    /// Keep only `Next` events; terminal events are dropped from both the
    /// recorded and the expected sequence.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn filter_next(self) -> Self {
        self.lock().only_next = true;
        self
    }

    /// Restrict the comparison to events inside `window`. Wildcard-time
    /// expected events always survive.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn within(self, window: Range<VirtualTime>) -> Self {
        self.lock().window = window;
        self
    }

    /// Restrict the comparison to events at or after `time`.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn since(self, time: VirtualTime) -> Self {
        {
            let mut state = self.lock();
            let end = state.window.end;
            state.window = time..end;
        }
        self
    }

    /// Restrict the comparison to events before `time`.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn until(self, time: VirtualTime) -> Self {
        {
            let mut state = self.lock();
            let start = state.window.start;
            state.window = start..time;
        }
        self
    }

    /// Invert the outcome of the terminal operation. Applying `not` twice
    /// cancels out.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn not(self) -> Self {
        {
            let mut state = self.lock();
            state.negated = !state.negated;
        }
        self
    }

    /// Forcibly unsubscribe from the source at virtual time `time`, so
    /// unbounded sources stop being captured from that point on.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn dispose_at(self, time: VirtualTime) -> Self {
        self.lock().dispose_at = Some(time);
        self
    }

    /// Attach a descriptive label, prepended to this assertion's failure
    /// message.
    #[must_use = "assertion filters do nothing until a terminal operation is called"]
    pub fn message(self, message: impl Into<String>) -> Self {
        self.lock().message = Some(message.into());
        self
    }

    // ==================== Terminal Operations ====================

    /// Assert the filtered recording equals `expected`, positionally, with
    /// wildcard-aware times.
    #[track_caller]
    pub fn equal(self, expected: Vec<Recorded<T>>)
    where
        T: PartialEq,
    {
        self.finish(Check::Equal {
            expected,
            eq: Arc::new(|a, b| a == b),
        });
    }

    /// [`equal`](Assertion::equal) with a custom element comparison.
    #[track_caller]
    pub fn equal_by(
        self,
        expected: Vec<Recorded<T>>,
        eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) {
        self.finish(Check::Equal {
            expected,
            eq: Arc::new(eq),
        });
    }

    /// Assert the filtered recording's values equal `values`, ignoring
    /// timestamps (each expected value gets the wildcard time).
    #[track_caller]
    pub fn equal_values(self, values: Vec<T>)
    where
        T: PartialEq,
    {
        self.finish(Check::Equal {
            expected: values.into_iter().map(any).collect(),
            eq: Arc::new(|a, b| a == b),
        });
    }

    /// [`equal_values`](Assertion::equal_values) with a custom element
    /// comparison.
    #[track_caller]
    pub fn equal_values_by(
        self,
        values: Vec<T>,
        eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) {
        self.finish(Check::Equal {
            expected: values.into_iter().map(any).collect(),
            eq: Arc::new(eq),
        });
    }

    /// Assert some filtered recorded event equals `event` (unordered,
    /// wildcard-aware).
    #[track_caller]
    pub fn contains(self, event: Recorded<T>)
    where
        T: PartialEq,
    {
        self.finish(Check::Contains {
            target: event,
            eq: Arc::new(|a, b| a == b),
        });
    }

    /// [`contains`](Assertion::contains) with a custom element comparison.
    #[track_caller]
    pub fn contains_by(
        self,
        event: Recorded<T>,
        eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) {
        self.finish(Check::Contains {
            target: event,
            eq: Arc::new(eq),
        });
    }

    /// Assert some filtered recorded event is `Next(value)`, at any time.
    #[track_caller]
    pub fn contains_value(self, value: T)
    where
        T: PartialEq,
    {
        self.finish(Check::Contains {
            target: any(value),
            eq: Arc::new(|a, b| a == b),
        });
    }

    /// Assert some filtered recorded event satisfies `predicate`.
    #[track_caller]
    pub fn contains_where(self, predicate: impl Fn(&Recorded<T>) -> bool + Send + Sync + 'static) {
        self.finish(Check::ContainsWhere {
            predicate: Arc::new(predicate),
        });
    }

    /// Assert exactly `expected` events survive filtering.
    #[track_caller]
    pub fn count(self, expected: usize) {
        self.finish(Check::Count { expected });
    }

    /// Assert no events survive filtering.
    #[track_caller]
    pub fn is_empty(self) {
        self.finish(Check::Empty);
    }

    /// Assert the filtered recording satisfies `predicate` as a whole
    /// sequence.
    ///
    /// The escape hatch for conditions the other terminals cannot express;
    /// [`RecordedSequence`](crate::RecordedSequence) gives convenient access
    /// to the sequence's values and errors.
    #[track_caller]
    pub fn verify(self, predicate: impl Fn(&[Recorded<T>]) -> bool + Send + Sync + 'static) {
        self.finish(Check::Verify {
            predicate: Arc::new(predicate),
        });
    }

    #[track_caller]
    fn finish(self, check: Check<T>) {
        let mut state = self.lock();
        state.check = Some(check);
        state.verdict_at = Location::caller();
    }
}

impl<T: Element> fmt::Debug for Assertion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Assertion")
            .field("window", &state.window)
            .field("only_next", &state.only_next)
            .field("negated", &state.negated)
            .field("declared_at", &state.declared_at)
            .finish_non_exhaustive()
    }
}

/// Harness-side view of a declared assertion, erased over the element type.
pub(crate) trait AnyAssertion: Send {
    /// Subscribe the recording to its source and schedule any timed
    /// teardown. Runs once, at the start of the run phase.
    fn wire(&self, clock: &VirtualClock, keep_alive: &mut Vec<Subscription>);

    /// Latest concrete virtual time this assertion mentions (expected event
    /// times and the dispose time); used for the run horizon.
    fn latest_declared_time(&self) -> VirtualTime;

    /// Filter, compare, and produce this assertion's single result.
    fn evaluate(&self) -> AssertionResult;
}

struct AssertionHandle<T: Element>(Arc<Mutex<AssertionState<T>>>);

impl<T: Element> AssertionHandle<T> {
    fn lock(&self) -> MutexGuard<'_, AssertionState<T>> {
        self.0.lock().expect("assertion state poisoned")
    }
}

impl<T: Element> AnyAssertion for AssertionHandle<T> {
    fn wire(&self, clock: &VirtualClock, keep_alive: &mut Vec<Subscription>) {
        let mut state = self.lock();
        let recording = Recording::new();
        let subscription = recording.wire(state.source.as_ref(), clock.handle());
        if let Some(time) = state.dispose_at {
            let teardown = subscription.clone();
            clock.schedule_at(time, move || teardown.dispose());
        }
        keep_alive.push(subscription);
        state.recording = Some(recording);
    }

    fn latest_declared_time(&self) -> VirtualTime {
        let state = self.lock();
        let mut latest = VirtualTime::MIN;
        match &state.check {
            Some(Check::Equal { expected, .. }) => {
                for event in expected {
                    latest = latest.max(event.time);
                }
            }
            Some(Check::Contains { target, .. }) => latest = latest.max(target.time),
            _ => {}
        }
        if let Some(time) = state.dispose_at {
            latest = latest.max(time);
        }
        latest
    }

    fn evaluate(&self) -> AssertionResult {
        let state = self.lock();
        let recording = state
            .recording
            .as_ref()
            .expect("assertion evaluated before its recording was wired");
        let check = match &state.check {
            Some(check) => check,
            None => panic!(
                "assertion declared at {} has no terminal operation \
                 (equal / contains / count / is_empty)",
                state.declared_at
            ),
        };

        let recorded = filter_events(&recording.captured(), &state.window, state.only_next);
        let (held, expectation) = match check {
            Check::Equal { expected, eq } => {
                let expected = filter_events(expected, &state.window, state.only_next);
                let held = sequences_equal(&expected, &recorded, eq.as_ref());
                (held, format!("expected: {}", display_sequence(&expected)))
            }
            Check::Contains { target, eq } => {
                let held = sequence_contains(&recorded, target, eq.as_ref());
                (held, format!("expected to contain: {target}"))
            }
            Check::ContainsWhere { predicate } => {
                let predicate = predicate.as_ref();
                let held = recorded.iter().any(|event| predicate(event));
                (held, "expected an event matching the predicate".to_string())
            }
            Check::Count { expected } => {
                let held = recorded.len() == *expected;
                (
                    held,
                    format!("expected {expected} event(s) after filtering"),
                )
            }
            Check::Empty => (
                recorded.is_empty(),
                "expected no events after filtering".to_string(),
            ),
            Check::Verify { predicate } => (
                predicate(&recorded),
                "expected the recorded sequence to satisfy the predicate".to_string(),
            ),
        };

        if held != state.negated {
            AssertionResult::Success {
                location: state.verdict_at,
            }
        } else {
            let negation = if state.negated { " (negated)" } else { "" };
            let label = state
                .message
                .as_deref()
                .map(|message| format!("{message}\n"))
                .unwrap_or_default();
            AssertionResult::Failure {
                message: format!(
                    "{label}{expectation}{negation}\n  recorded: {}",
                    display_sequence(&recorded)
                ),
                location: state.verdict_at,
            }
        }
    }
}

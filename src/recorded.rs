use std::fmt;

use crate::{
    event::{events_equal, StreamError},
    time::{display_time, times_equal, ANY_TIME},
    StreamEvent, VirtualTime,
};

/// A stream event stamped with the virtual time it occurred at.
///
/// `Recorded` values appear on both sides of an assertion: the harness
/// captures them from observed sources, and tests build them as expected
/// sequences with the [`next`], [`any`], [`error`], [`failed`], and
/// [`completed`] constructors.
///
/// For a single source, captured sequences are non-decreasing in `time` in
/// emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Recorded<T> {
    /// Virtual time of the emission. [`ANY_TIME`] in an expected event
    /// matches any captured time.
    pub time: VirtualTime,
    /// The emission itself.
    pub event: StreamEvent<T>,
}

impl<T> Recorded<T> {
    /// Create a record directly from its parts.
    pub fn new(time: VirtualTime, event: StreamEvent<T>) -> Self {
        Recorded { time, event }
    }

    /// Returns true if this records a `Next` emission.
    pub fn is_next(&self) -> bool {
        self.event.is_next()
    }

    /// The carried value, if this records a `Next` emission.
    pub fn value(&self) -> Option<&T> {
        self.event.value()
    }

    /// Returns true if the timestamp is the wildcard.
    pub fn has_wildcard_time(&self) -> bool {
        self.time == ANY_TIME
    }
}

/// A `Next` event at a concrete time.
pub fn next<T>(time: VirtualTime, value: T) -> Recorded<T> {
    Recorded::new(time, StreamEvent::Next(value))
}

/// A `Next` event that matches any timestamp.
///
/// Only meaningful in expected sequences; see [`ANY_TIME`].
pub fn any<T>(value: T) -> Recorded<T> {
    Recorded::new(ANY_TIME, StreamEvent::Next(value))
}

/// An `Error` event at a concrete time, wrapping the given error value.
pub fn error<T>(time: VirtualTime, err: impl std::error::Error + Send + Sync + 'static) -> Recorded<T> {
    Recorded::new(time, StreamEvent::Error(StreamError::new(err)))
}

/// An `Error` event at a concrete time, carrying only a message.
pub fn failed<T>(time: VirtualTime, message: impl Into<String>) -> Recorded<T> {
    Recorded::new(time, StreamEvent::Error(StreamError::message(message)))
}

/// A `Completed` event at a concrete time.
pub fn completed<T>(time: VirtualTime) -> Recorded<T> {
    Recorded::new(time, StreamEvent::Completed)
}

/// Wildcard-aware equality of two recorded events.
///
/// Times compare per [`times_equal`], events per [`events_equal`] with the
/// supplied element comparison.
pub fn recorded_equal<T>(
    lhs: &Recorded<T>,
    rhs: &Recorded<T>,
    elem_eq: impl Fn(&T, &T) -> bool,
) -> bool {
    times_equal(lhs.time, rhs.time) && events_equal(&lhs.event, &rhs.event, elem_eq)
}

/// Positional sequence equality.
///
/// Two sequences are equal when they have the same length and are pairwise
/// [`recorded_equal`] at the same index. Reordering breaks equality even
/// when the multisets match.
pub fn sequences_equal<T>(
    lhs: &[Recorded<T>],
    rhs: &[Recorded<T>],
    elem_eq: impl Fn(&T, &T) -> bool,
) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .zip(rhs.iter())
            .all(|(l, r)| recorded_equal(l, r, &elem_eq))
}

/// Unordered existence check: does any element of `sequence` match `target`
/// under [`recorded_equal`]?
pub fn sequence_contains<T>(
    sequence: &[Recorded<T>],
    target: &Recorded<T>,
    elem_eq: impl Fn(&T, &T) -> bool,
) -> bool {
    sequence.iter().any(|rec| recorded_equal(rec, target, &elem_eq))
}

/// Convenience accessors over a sequence of recorded events.
///
/// Implemented for slices of [`Recorded`], so both capture snapshots and
/// expected-event vectors can use them. Pairs with
/// [`Assertion::verify`](crate::Assertion::verify) for whole-sequence
/// conditions the other terminals cannot express.
pub trait RecordedSequence<T> {
    /// The payloads of every `Next` event, in order.
    fn values(&self) -> Vec<T>;

    /// The error carried by the first `Error` event, if any.
    fn first_error(&self) -> Option<StreamError>;
}

impl<T: Clone> RecordedSequence<T> for [Recorded<T>] {
    fn values(&self) -> Vec<T> {
        self.iter().filter_map(|rec| rec.value().cloned()).collect()
    }

    fn first_error(&self) -> Option<StreamError> {
        self.iter().find_map(|rec| rec.event.error().cloned())
    }
}

impl<T: fmt::Debug> fmt::Display for Recorded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = display_time(self.time);
        match &self.event {
            StreamEvent::Next(value) => write!(f, "next({time}, {value:?})"),
            StreamEvent::Error(err) => write!(f, "error({time}, {err})"),
            StreamEvent::Completed => write!(f, "completed({time})"),
        }
    }
}

/// Renders a sequence for failure messages, one event per element.
pub(crate) fn display_sequence<T: fmt::Debug>(events: &[Recorded<T>]) -> String {
    let rendered: Vec<String> = events.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest, Strategy};

    #[test]
    fn constructors_stamp_times() {
        assert_eq!(next(100, "A"), Recorded::new(100, StreamEvent::Next("A")));
        assert_eq!(any("A"), Recorded::new(ANY_TIME, StreamEvent::Next("A")));
        assert_eq!(completed::<i32>(300).event, StreamEvent::Completed);
        assert!(failed::<i32>(50, "boom").event.is_error());
    }

    #[test]
    fn wildcard_time_matches_any_concrete_time() {
        let eq = |a: &&str, b: &&str| a == b;
        assert!(recorded_equal(&any("A"), &next(100, "A"), eq));
        assert!(recorded_equal(&next(100, "A"), &any("A"), eq));
        assert!(!recorded_equal(&any("A"), &next(100, "B"), eq));
    }

    #[test]
    fn sequence_equality_is_positional() {
        let eq = |a: &&str, b: &&str| a == b;
        let recorded = vec![next(100, "A"), next(200, "B")];
        let reordered = vec![next(200, "B"), next(100, "A")];
        assert!(sequences_equal(&recorded, &recorded.clone(), eq));
        assert!(!sequences_equal(&recorded, &reordered, eq));
    }

    #[test]
    fn sequence_equality_requires_matching_length() {
        let eq = |a: &i32, b: &i32| a == b;
        assert!(!sequences_equal(&[next(100, 1)], &[], eq));
        assert!(!sequences_equal(
            &[next(100, 1)],
            &[next(100, 1), next(200, 2)],
            eq
        ));
    }

    #[test]
    fn contains_finds_events_regardless_of_position() {
        let eq = |a: &i32, b: &i32| a == b;
        let recorded = vec![next(100, 1), next(200, 2), completed(300)];
        assert!(sequence_contains(&recorded, &next(200, 2), eq));
        assert!(sequence_contains(&recorded, &any(1), eq));
        assert!(sequence_contains(&recorded, &completed(300), eq));
        assert!(!sequence_contains(&recorded, &next(100, 2), eq));
    }

    #[test]
    fn sequence_accessors_extract_values_and_first_error() {
        let events = vec![next(100, 1), failed(200, "boom"), completed(300)];
        assert_eq!(events.values(), vec![1]);
        assert_eq!(events.first_error(), Some(StreamError::message("boom")));
        assert_eq!(Vec::<Recorded<i32>>::new().first_error(), None);
    }

    #[test]
    fn display_renders_wildcard_and_kinds() {
        assert_eq!(next(100, "A").to_string(), r#"next(100, "A")"#);
        assert_eq!(any(1).to_string(), "next(any, 1)");
        assert_eq!(failed::<i32>(50, "boom").to_string(), "error(50, boom)");
        assert_eq!(completed::<i32>(300).to_string(), "completed(300)");
        assert_eq!(
            display_sequence(&[next(1, 2), completed(3)]),
            "[next(1, 2), completed(3)]"
        );
    }

    fn recorded_events() -> impl Strategy<Value = Vec<Recorded<i32>>> {
        proptest::collection::vec((0i64..1_000, proptest::num::i32::ANY), 0..16).prop_map(
            |mut raw| {
                raw.sort_by_key(|(time, _)| *time);
                raw.into_iter().map(|(time, value)| next(time, value)).collect()
            },
        )
    }

    proptest! {
        #[test]
        fn contains_is_reflexive(events in recorded_events()) {
            for event in &events {
                prop_assert!(sequence_contains(&events, event, |a, b| a == b));
            }
        }

        #[test]
        fn sequences_equal_is_reflexive(events in recorded_events()) {
            prop_assert!(sequences_equal(&events, &events, |a, b| a == b));
        }
    }
}

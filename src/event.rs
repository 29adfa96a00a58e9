use std::{error::Error as StdError, fmt, sync::Arc};

/// Marker trait for stream element types.
///
/// Payloads must be `Debug + Clone + Send + Sync + 'static` because they:
/// - Are rendered in assertion failure messages (Debug)
/// - Are delivered to every subscriber of a [`Subject`](crate::Subject) (Clone)
/// - Sit in expected-event scripts shared across threads (Sync)
/// - Cross into scheduled clock actions, which may hop threads (Send, 'static)
///
/// Implemented automatically for every qualifying type; there is nothing to
/// derive.
pub trait Element: fmt::Debug + Clone + Send + Sync + 'static {}

impl<T: fmt::Debug + Clone + Send + Sync + 'static> Element for T {}

/// A shared, cloneable stream error.
///
/// Errors carried by [`StreamEvent::Error`] are boxed behind an `Arc` so
/// events stay cheap to clone across subscribers. Two stream errors compare
/// equal when their rendered messages are identical, which is the only
/// comparison that holds up across arbitrary error types.
#[derive(Clone)]
pub struct StreamError(Arc<dyn StdError + Send + Sync>);

impl StreamError {
    /// Wrap any error value.
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        StreamError(Arc::new(err))
    }

    /// Build an error from a plain message, for tests that only care about
    /// the error text.
    pub fn message(text: impl Into<String>) -> Self {
        StreamError(Arc::new(TextError(text.into())))
    }

    /// The inner error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync) {
        self.0.as_ref()
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_string() == other.0.to_string()
    }
}

impl Eq for StreamError {}

#[cfg(feature = "serde")]
impl serde::Serialize for StreamError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

#[derive(Debug)]
struct TextError(String);

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for TextError {}

/// A discriminated stream notification.
///
/// The three kinds mirror what a reactive source can emit: a value, a
/// terminal error, or a terminal completion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum StreamEvent<T> {
    /// A value emission.
    Next(T),
    /// Terminal failure.
    Error(StreamError),
    /// Terminal, successful end of the stream.
    Completed,
}

impl<T> StreamEvent<T> {
    /// Returns true for [`StreamEvent::Next`].
    pub fn is_next(&self) -> bool {
        matches!(self, StreamEvent::Next(_))
    }

    /// Returns true for [`StreamEvent::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }

    /// Returns true for [`StreamEvent::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamEvent::Completed)
    }

    /// Returns true for either terminal kind.
    pub fn is_terminal(&self) -> bool {
        !self.is_next()
    }

    /// The carried value, if this is a `Next` event.
    pub fn value(&self) -> Option<&T> {
        match self {
            StreamEvent::Next(value) => Some(value),
            _ => None,
        }
    }

    /// The carried error, if this is an `Error` event.
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            StreamEvent::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Event equality under a caller-supplied element comparison.
///
/// `Completed` matches `Completed`; errors match when their messages render
/// identically; values match per `elem_eq`. Mixed kinds never match. Use
/// this over `PartialEq` when the element type has no usable `==`.
pub fn events_equal<T>(
    lhs: &StreamEvent<T>,
    rhs: &StreamEvent<T>,
    elem_eq: impl Fn(&T, &T) -> bool,
) -> bool {
    match (lhs, rhs) {
        (StreamEvent::Completed, StreamEvent::Completed) => true,
        (StreamEvent::Error(l), StreamEvent::Error(r)) => l == r,
        (StreamEvent::Next(l), StreamEvent::Next(r)) => elem_eq(l, r),
        _ => false,
    }
}

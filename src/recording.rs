use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    clock::ClockHandle,
    source::{Source, Subscription},
    Element, Recorded,
};

/// The captured, time-ordered log of one observed source.
///
/// A recording is wired to its source when the harness enters the run phase:
/// the subscription callback stamps every delivered event with the clock's
/// current virtual time and appends it to the capture buffer. Only that
/// callback ever writes to the buffer, and the clock delivers actions
/// serially, so captured order is emission order. Once the clock has
/// settled, the recording is effectively read-only.
pub struct Recording<T: Element> {
    events: Arc<Mutex<Vec<Recorded<T>>>>,
}

impl<T: Element> Recording<T> {
    pub(crate) fn new() -> Self {
        Recording {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to `source` and start capturing, stamping each event with
    /// the clock's current time.
    pub(crate) fn wire(&self, source: &dyn Source<T>, handle: ClockHandle) -> Subscription {
        let events = Arc::clone(&self.events);
        source.subscribe(Box::new(move |event| {
            events
                .lock()
                .expect("capture buffer poisoned")
                .push(Recorded::new(handle.now(), event));
        }))
    }

    /// A snapshot of everything captured so far.
    pub fn captured(&self) -> Vec<Recorded<T>> {
        self.events.lock().expect("capture buffer poisoned").clone()
    }

    /// Number of captured events.
    pub fn len(&self) -> usize {
        self.events.lock().expect("capture buffer poisoned").len()
    }

    /// Returns true if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Element> Clone for Recording<T> {
    fn clone(&self) -> Self {
        Recording {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T: Element> fmt::Debug for Recording<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("captured", &self.len())
            .finish()
    }
}

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    source::{Observer, Sink, Source, Subscription},
    Element, StreamEvent, Subject,
};

/// A value cell with an observable change stream.
///
/// A `Variable` always holds a current value. Setting it (directly or by
/// feeding `Next` events through [`Harness::input`](crate::Harness::input))
/// updates the cell and relays the new value to subscribers. Subscribing
/// replays the current value first, then relays subsequent changes, so a
/// recording wired before the run phase captures the initial value at tick 0.
///
/// Terminal events have no meaning for a cell that always has a value;
/// `Error` and `Completed` are ignored with a warning.
pub struct Variable<T: Element> {
    value: Arc<Mutex<T>>,
    relay: Subject<T>,
}

impl<T: Element> Variable<T> {
    /// Create a variable holding `initial`.
    pub fn new(initial: T) -> Self {
        Variable {
            value: Arc::new(Mutex::new(initial)),
            relay: Subject::new(),
        }
    }

    /// A clone of the current value.
    pub fn get(&self) -> T {
        self.value.lock().expect("variable value poisoned").clone()
    }

    /// Replace the current value and relay it to subscribers.
    pub fn set(&self, value: T) {
        *self.value.lock().expect("variable value poisoned") = value.clone();
        self.relay.accept(StreamEvent::Next(value));
    }
}

impl<T: Element> Sink<T> for Variable<T> {
    fn accept(&self, event: StreamEvent<T>) {
        match event {
            StreamEvent::Next(value) => self.set(value),
            other => {
                tracing::warn!(kind = ?other, "variable ignores terminal events");
            }
        }
    }
}

impl<T: Element> Source<T> for Variable<T> {
    fn subscribe(&self, mut observer: Observer<T>) -> Subscription {
        observer(StreamEvent::Next(self.get()));
        self.relay.subscribe(observer)
    }
}

impl<T: Element> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Variable {
            value: Arc::clone(&self.value),
            relay: self.relay.clone(),
        }
    }
}

impl<T: Element> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable").field("value", &self.get()).finish()
    }
}

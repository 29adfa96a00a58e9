use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    source::{Observer, Sink, Source, Subscription},
    Element, StreamEvent,
};

/// A hot, multicast relay.
///
/// Every event accepted by a subject is delivered to all current
/// subscribers, in subscription order; subscribers attached later see only
/// later events. After a terminal event (`Error` or `Completed`) the subject
/// stops relaying.
///
/// Subjects are the usual input target and observation point in harness
/// tests: feed one with [`Harness::input`](crate::Harness::input), observe
/// one (or a stage downstream of one) with
/// [`Harness::expect`](crate::Harness::expect). Cloning a subject is cheap
/// and shares the subscriber list.
pub struct Subject<T: Element> {
    core: Arc<SubjectCore<T>>,
}

struct SubjectCore<T> {
    state: Mutex<SubjectState<T>>,
}

struct SubjectState<T> {
    observers: Vec<(u64, Arc<Mutex<Observer<T>>>)>,
    next_key: u64,
    stopped: bool,
}

impl<T: Element> Subject<T> {
    /// Create a subject with no subscribers.
    pub fn new() -> Self {
        Subject {
            core: Arc::new(SubjectCore {
                state: Mutex::new(SubjectState {
                    observers: Vec::new(),
                    next_key: 0,
                    stopped: false,
                }),
            }),
        }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state().observers.len()
    }

    /// Returns true once a terminal event has been relayed.
    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }

    fn state(&self) -> MutexGuard<'_, SubjectState<T>> {
        self.core.state.lock().expect("subject state poisoned")
    }

    fn emit(&self, event: StreamEvent<T>) {
        // Snapshot the subscriber list and release the lock before calling
        // out, so an observer may subscribe or emit re-entrantly.
        let observers: Vec<Arc<Mutex<Observer<T>>>> = {
            let mut state = self.state();
            if state.stopped {
                return;
            }
            if event.is_terminal() {
                state.stopped = true;
            }
            state
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect()
        };
        for observer in observers {
            let mut observer = observer.lock().expect("observer poisoned");
            (*observer)(event.clone());
        }
    }
}

impl<T: Element> Sink<T> for Subject<T> {
    fn accept(&self, event: StreamEvent<T>) {
        self.emit(event);
    }
}

impl<T: Element> Source<T> for Subject<T> {
    fn subscribe(&self, observer: Observer<T>) -> Subscription {
        let key = {
            let mut state = self.state();
            let key = state.next_key;
            state.next_key += 1;
            state.observers.push((key, Arc::new(Mutex::new(observer))));
            key
        };
        let core = Arc::clone(&self.core);
        Subscription::new(move || {
            core.state
                .lock()
                .expect("subject state poisoned")
                .observers
                .retain(|(k, _)| *k != key);
        })
    }
}

impl<T: Element> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Subject {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Element> Default for Subject<T> {
    fn default() -> Self {
        Subject::new()
    }
}

impl<T: Element> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Subject")
            .field("subscribers", &state.observers.len())
            .field("stopped", &state.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamError;

    fn capture<T: Element>() -> (Arc<Mutex<Vec<StreamEvent<T>>>>, Observer<T>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Observer<T> = Box::new(move |event| sink.lock().unwrap().push(event));
        (seen, observer)
    }

    #[test]
    fn relays_events_to_all_subscribers() {
        let subject = Subject::<i32>::new();
        let (first, observer) = capture();
        let _a = subject.subscribe(observer);
        let (second, observer) = capture();
        let _b = subject.subscribe(observer);

        subject.accept(StreamEvent::Next(1));

        assert_eq!(*first.lock().unwrap(), vec![StreamEvent::Next(1)]);
        assert_eq!(*second.lock().unwrap(), vec![StreamEvent::Next(1)]);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let subject = Subject::<i32>::new();
        subject.accept(StreamEvent::Next(1));

        let (seen, observer) = capture();
        let _sub = subject.subscribe(observer);
        subject.accept(StreamEvent::Next(2));

        assert_eq!(*seen.lock().unwrap(), vec![StreamEvent::Next(2)]);
    }

    #[test]
    fn disposed_subscribers_stop_receiving() {
        let subject = Subject::<i32>::new();
        let (seen, observer) = capture();
        let sub = subject.subscribe(observer);

        subject.accept(StreamEvent::Next(1));
        sub.dispose();
        subject.accept(StreamEvent::Next(2));

        assert_eq!(*seen.lock().unwrap(), vec![StreamEvent::Next(1)]);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn stops_relaying_after_terminal_event() {
        let subject = Subject::<i32>::new();
        let (seen, observer) = capture();
        let _sub = subject.subscribe(observer);

        subject.accept(StreamEvent::Next(1));
        subject.accept(StreamEvent::Completed);
        subject.accept(StreamEvent::Next(2));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StreamEvent::Next(1), StreamEvent::Completed]
        );
        assert!(subject.is_stopped());
    }

    #[test]
    fn error_is_terminal_too() {
        let subject = Subject::<i32>::new();
        subject.accept(StreamEvent::Error(StreamError::message("boom")));
        assert!(subject.is_stopped());
    }

    #[test]
    fn observers_may_emit_reentrantly_into_another_subject() {
        let upstream = Subject::<i32>::new();
        let downstream = Subject::<i32>::new();
        let (seen, observer) = capture();
        let _out = downstream.subscribe(observer);

        let relay = downstream.clone();
        let _stage = upstream.subscribe(Box::new(move |event| {
            if let StreamEvent::Next(value) = event {
                relay.accept(StreamEvent::Next(value * 10));
            }
        }));

        upstream.accept(StreamEvent::Next(4));
        assert_eq!(*seen.lock().unwrap(), vec![StreamEvent::Next(40)]);
    }
}

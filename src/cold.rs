use std::{fmt, sync::Arc};

use crate::{
    clock::ClockHandle,
    source::{Observer, Sink, Source, Subscription},
    Element, Error, Recorded, Result, Subject, ANY_TIME,
};

/// A cold source: replays a scripted event sequence to each subscriber.
///
/// Event times in the script are *offsets from the subscription time*. Each
/// subscriber gets its own playback, scheduled on the harness clock, so two
/// subscriptions at different ticks observe the same shape shifted in time.
/// Disposing the subscription stops delivery of any not-yet-played events.
///
/// ```ignore
/// let ticks = ColdSource::new(h.clock_handle(), vec![next(10, 1), next(20, 2), completed(30)])?;
/// h.expect(&ticks).equal(vec![next(10, 1), next(20, 2), completed(30)]);
/// ```
pub struct ColdSource<T: Element> {
    handle: ClockHandle,
    script: Arc<Vec<Recorded<T>>>,
}

impl<T: Element> ColdSource<T> {
    /// Create a cold source from its script.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WildcardInput`] if any script event carries the
    /// wildcard time; playback offsets must be concrete.
    pub fn new(handle: ClockHandle, script: Vec<Recorded<T>>) -> Result<Self> {
        if let Some(index) = script.iter().position(|event| event.time == ANY_TIME) {
            return Err(Error::WildcardInput { index });
        }
        Ok(ColdSource {
            handle,
            script: Arc::new(script),
        })
    }
}

impl<T: Element> Source<T> for ColdSource<T> {
    fn subscribe(&self, observer: Observer<T>) -> Subscription {
        // Route playback through a private relay so disposal detaches the
        // observer even while scheduled deliveries remain.
        let relay = Subject::new();
        let subscription = relay.subscribe(observer);
        let base = self.handle.now();
        for scripted in self.script.iter() {
            let relay = relay.clone();
            let event = scripted.event.clone();
            self.handle
                .schedule_at(base.saturating_add(scripted.time), move || {
                    relay.accept(event)
                });
        }
        subscription
    }
}

impl<T: Element> Clone for ColdSource<T> {
    fn clone(&self) -> Self {
        ColdSource {
            handle: self.handle.clone(),
            script: Arc::clone(&self.script),
        }
    }
}

impl<T: Element> fmt::Debug for ColdSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColdSource")
            .field("script_len", &self.script.len())
            .finish_non_exhaustive()
    }
}

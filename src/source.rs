use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{Element, StreamEvent};

/// Boxed subscription callback.
///
/// Observers receive every event a source emits after the subscription, in
/// emission order. They are `FnMut` so a recorder can push into its capture
/// buffer, and `Send` so delivery may happen inside scheduled clock actions.
pub type Observer<T> = Box<dyn FnMut(StreamEvent<T>) + Send>;

/// The drivable side of a stream: anything that can be fed events.
///
/// Input declarations target a `Sink`; the harness delivers each declared
/// event to it at the event's virtual time.
pub trait Sink<T: Element>: Send {
    /// Deliver one event.
    fn accept(&self, event: StreamEvent<T>);
}

/// The observable side of a stream: anything that can be subscribed to.
///
/// Observation declarations record from a `Source`; disposing the returned
/// [`Subscription`] detaches the observer.
pub trait Source<T: Element> {
    /// Attach an observer, returning its disposal token.
    fn subscribe(&self, observer: Observer<T>) -> Subscription;
}

/// Disposal token for an active subscription.
///
/// Cloneable so teardown can be both held by the harness and scheduled as a
/// clock action. Disposal is idempotent, never fails, and also happens
/// automatically when the last clone is dropped.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Build a subscription from its teardown action.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            inner: Arc::new(SubscriptionInner {
                teardown: Mutex::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Subscription {
            inner: Arc::new(SubscriptionInner {
                teardown: Mutex::new(None),
            }),
        }
    }

    /// Run the teardown. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        let teardown = self
            .inner
            .teardown
            .lock()
            .expect("subscription teardown poisoned")
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Returns true once the teardown has run (or was never needed).
    pub fn is_disposed(&self) -> bool {
        self.inner
            .teardown
            .lock()
            .expect("subscription teardown poisoned")
            .is_none()
    }
}

impl Drop for SubscriptionInner {
    fn drop(&mut self) {
        if let Some(teardown) = self
            .teardown
            .lock()
            .expect("subscription teardown poisoned")
            .take()
        {
            teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

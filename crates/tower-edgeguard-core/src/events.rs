//! Observability events for edge-protection components.
//!
//! Components publish structured events to a per-instance [`EventSink`];
//! the composition root decides where they go (logs, counters, a
//! channel). Subscribers are plain closures registered through config
//! builders before the owning component is built, so the subscriber
//! list is immutable afterwards and publishing never takes a lock.
//! Delivery is synchronous at the publication site and isolated: a
//! subscriber that panics is logged and skipped, never silencing the
//! subscribers behind it.

use std::fmt;
use std::sync::Arc;

/// An event published by an edgeguard component.
///
/// The two accessors exist for delivery diagnostics: when a subscriber
/// misbehaves, the warning and the panic counter have to say which
/// component instance and which kind of event were in flight. Anything
/// else a subscriber needs rides in the event value itself.
pub trait EdgeEvent: fmt::Debug {
    /// Stable snake_case name of the event kind.
    fn kind(&self) -> &'static str;

    /// Name of the component instance that published the event.
    fn component(&self) -> &str;
}

type Subscriber<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A per-instance set of event subscribers.
pub struct EventSink<E> {
    subscribers: Vec<Subscriber<E>>,
}

impl<E: EdgeEvent> EventSink<E> {
    /// Creates a sink with no subscribers; publishing to it is a no-op.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Registers a closure that observes every event published to this
    /// sink.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(f));
    }

    /// Publishes one event to every subscriber.
    ///
    /// A panicking subscriber must not blind the rest, and must not
    /// take down the request that happened to trigger the event: the
    /// panic is caught, logged, and counted, and delivery continues.
    pub fn publish(&self, event: &E) {
        for (index, subscriber) in self.subscribers.iter().enumerate() {
            let delivered =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| subscriber(event)));

            if delivered.is_err() {
                tracing::warn!(
                    subscriber_index = index,
                    component = event.component(),
                    kind = event.kind(),
                    "edgeguard event subscriber panicked"
                );

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "edgeguard_event_subscriber_panics_total",
                    "component" => event.component().to_string(),
                    "kind" => event.kind().to_string()
                )
                .increment(1);
            }
        }
    }

    /// Returns true if no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Returns the number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }
}

// Hand-written so cloning a sink never demands `E: Clone`; clones share
// the registered subscribers.
impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<E: EdgeEvent> Default for EventSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

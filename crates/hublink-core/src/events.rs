//! Event system for hub connections.
//!
//! Every lifecycle fact a connection wants to publish (state transitions,
//! reconnect attempts, keep-alive timeouts) is an event implementing
//! [`HubEvent`], delivered synchronously to an [`EventListeners`] collection.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by a hub connection.
pub trait HubEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "state_transition", "reconnect_attempt").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the connection that emitted this event.
    fn connection_name(&self) -> &str;
}

/// Trait for listening to hub events.
pub trait EventListener<E: HubEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for shared event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered collection of event listeners.
///
/// Cloning is cheap: listeners are reference counted, so a clone shares the
/// listeners registered so far but not the ones added afterwards.
#[derive(Clone)]
pub struct EventListeners<E: HubEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: HubEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the
    /// remaining listeners still observe the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    connection = event.connection_name(),
                    event_type = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: HubEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HubEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A closure-backed event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: HubEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

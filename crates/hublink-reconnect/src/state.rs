//! Connection lifecycle state machine.

use crate::error::ConnectionError;
use crate::events::ConnectionEvent;
use hublink_core::{EventListener, EventListeners};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Lifecycle state of a hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Freshly built, opening the first link.
    Connecting,

    /// Link open and handshake complete; sends are allowed.
    Connected,

    /// The link was lost; deciding whether to reconnect.
    Disconnected,

    /// Waiting between or performing reconnection attempts.
    Reconnecting,

    /// Terminal. No transition leaves this state.
    Closed,
}

impl ConnectionState {
    /// Returns true if `self -> to` is a legal edge.
    ///
    /// `reconnect_enabled` gates the Disconnected -> Reconnecting edge.
    pub fn can_transition_to(self, to: ConnectionState, reconnect_enabled: bool) -> bool {
        use ConnectionState::*;

        match (self, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Connecting, Connected) => true,
            (Connected, Disconnected) => true,
            (Disconnected, Reconnecting) => reconnect_enabled,
            (Reconnecting, Connected) => true,
            _ => false,
        }
    }

    /// Lowercase name used in logs, errors, and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single source of truth for a connection's [`ConnectionState`].
///
/// Transitions are serialized: the legality check, the state write, and the
/// synchronous delivery of the resulting [`ConnectionEvent::StateTransition`]
/// happen under one lock. The lock is reentrant, so a listener may itself
/// request a transition (for example closing the connection from an on-open
/// callback). Reading the state never waits on listeners.
pub struct ConnectionStateMachine {
    name: String,
    reconnect_enabled: bool,
    serial: ReentrantMutex<()>,
    current: Mutex<ConnectionState>,
    listeners: RwLock<EventListeners<ConnectionEvent>>,
}

impl ConnectionStateMachine {
    /// Creates a state machine in [`ConnectionState::Connecting`].
    pub fn new(name: impl Into<String>, reconnect_enabled: bool) -> Self {
        Self::with_listeners(name, reconnect_enabled, EventListeners::new())
    }

    /// Creates a state machine that starts with `listeners` already subscribed.
    pub fn with_listeners(
        name: impl Into<String>,
        reconnect_enabled: bool,
        listeners: EventListeners<ConnectionEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            reconnect_enabled,
            serial: ReentrantMutex::new(()),
            current: Mutex::new(ConnectionState::Connecting),
            listeners: RwLock::new(listeners),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.current.lock()
    }

    /// Returns true if the current state is [`ConnectionState::Connected`].
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns true if the current state is [`ConnectionState::Closed`].
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Returns whether Disconnected -> Reconnecting is a legal edge.
    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    /// Moves to `to`, returning the previous state.
    ///
    /// Illegal requests fail with [`ConnectionError::InvalidTransition`] and
    /// leave the state unchanged. A successful transition notifies every
    /// listener before this call returns.
    pub fn transition(&self, to: ConnectionState) -> Result<ConnectionState, ConnectionError> {
        let _serial = self.serial.lock();

        let from = {
            let mut current = self.current.lock();
            let from = *current;
            if !from.can_transition_to(to, self.reconnect_enabled) {
                return Err(ConnectionError::InvalidTransition { from, to });
            }
            *current = to;
            from
        };

        #[cfg(feature = "tracing")]
        tracing::info!(connection = %self.name, from = %from, to = %to, "connection state transition");

        #[cfg(feature = "metrics")]
        counter!(
            "hublink_state_transitions_total",
            "connection" => self.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);

        self.emit(&ConnectionEvent::StateTransition {
            connection_name: self.name.clone(),
            timestamp: Instant::now(),
            from_state: from,
            to_state: to,
        });

        Ok(from)
    }

    /// Runs `f` while holding the transition lock.
    ///
    /// No other thread can transition while `f` runs, so a check performed in
    /// `f` still holds when `f` itself transitions.
    pub fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _serial = self.serial.lock();
        f()
    }

    /// Moves to [`ConnectionState::Closed`] unless already there.
    ///
    /// Returns true if this call performed the transition.
    pub fn close(&self) -> bool {
        self.transition(ConnectionState::Closed).is_ok()
    }

    /// Subscribes a listener to every event emitted through this machine.
    pub fn subscribe<L>(&self, listener: L)
    where
        L: EventListener<ConnectionEvent> + 'static,
    {
        self.listeners.write().add(listener);
    }

    /// Delivers `event` to every subscribed listener.
    pub fn emit(&self, event: &ConnectionEvent) {
        // Listeners run without the registry lock so they can subscribe more.
        let listeners = self.listeners.read().clone();
        listeners.emit(event);
    }

    /// Returns the connection name carried by emitted events.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("reconnect_enabled", &self.reconnect_enabled)
            .finish()
    }
}

//! Builder for hub connections.

use crate::config::{ReconnectConfig, DEFAULT_KEEP_ALIVE_INTERVAL};
use crate::connection::{HubConnection, Inner};
use crate::error::ConfigError;
use crate::events::{ConnectionEvent, DisconnectReason};
use crate::keepalive::{KeepAliveMonitor, DEFAULT_SERVER_TIMEOUT};
use crate::state::ConnectionStateMachine;
use crate::transport::Transport;
use hublink_core::{EventListener, EventListeners, FnListener};
use std::time::Duration;

/// Default limit on opening a link, handshake included.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Builder for configuring and constructing a [`HubConnection`].
pub struct HubConnectionBuilder<T> {
    transport: T,
    name: String,
    reconnect: Option<ReconnectConfig>,
    keep_alive_interval: Option<Duration>,
    server_timeout: Duration,
    handshake_timeout: Duration,
    event_listeners: EventListeners<ConnectionEvent>,
}

impl<T: Transport> HubConnectionBuilder<T> {
    /// Creates a builder with default values and no automatic reconnection.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            name: String::from("<unnamed>"),
            reconnect: None,
            keep_alive_interval: None,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this connection for observability.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reconnects after unexpected link loss according to `config`.
    ///
    /// Without this a lost link closes the connection for good. A
    /// `keep_alive_interval` carried by `config` takes precedence over
    /// [`keep_alive_interval`](Self::keep_alive_interval).
    pub fn with_automatic_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = Some(config);
        self
    }

    /// Sets the period between keep-alive pings.
    ///
    /// Default: 15 seconds
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Sets how long the hub may stay silent before the link is presumed lost.
    ///
    /// Default: 30 seconds
    pub fn server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// Sets the limit on opening a link, handshake included.
    ///
    /// Default: 15 seconds
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Subscribes a listener to every [`ConnectionEvent`].
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ConnectionEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback invoked when a connected link is lost.
    pub fn on_connection_lost<F>(mut self, f: F) -> Self
    where
        F: Fn(&DisconnectReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ConnectionEvent| {
            if let ConnectionEvent::ConnectionLost { reason, .. } = event {
                f(reason);
            }
        }));
        self
    }

    /// Registers a callback invoked before each reconnection wait with the
    /// attempt number and the wait.
    pub fn on_reconnect_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ConnectionEvent| {
            if let ConnectionEvent::ReconnectAttempt { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when the reconnection policy gives up.
    pub fn on_reconnect_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ConnectionEvent| {
            if let ConnectionEvent::ReconnectExhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Validates the configuration and builds the connection.
    pub fn build(self) -> Result<HubConnection<T>, ConfigError> {
        let policy = self
            .reconnect
            .as_ref()
            .map(ReconnectConfig::build_policy)
            .transpose()?;

        let keep_alive_interval = self
            .reconnect
            .as_ref()
            .and_then(ReconnectConfig::keep_alive)
            .or(self.keep_alive_interval)
            .unwrap_or(DEFAULT_KEEP_ALIVE_INTERVAL);

        for (field, value) in [
            ("keep_alive_interval", keep_alive_interval),
            ("server_timeout", self.server_timeout),
            ("handshake_timeout", self.handshake_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::NonPositiveDuration { field });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            connection = %self.name,
            policy = policy.as_ref().map_or("none", |p| p.kind()),
            ?keep_alive_interval,
            "building hub connection"
        );

        let keep_alive =
            KeepAliveMonitor::new(self.name.clone(), keep_alive_interval, self.server_timeout);
        let state = ConnectionStateMachine::with_listeners(
            self.name.clone(),
            policy.is_some(),
            self.event_listeners,
        );

        Ok(HubConnection::from_inner(Inner::new(
            self.name,
            self.transport,
            state,
            policy,
            keep_alive,
            self.handshake_timeout,
        )))
    }
}

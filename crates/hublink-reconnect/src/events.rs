use crate::state::ConnectionState;
use hublink_core::HubEvent;
use std::fmt;
use std::time::{Duration, Instant};

/// Why a connected link was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport's event stream ended.
    TransportClosed,
    /// The transport reported an error.
    TransportError(String),
    /// The hub sent a close message, optionally carrying an error.
    ServerClosed(Option<String>),
    /// No inbound traffic was seen within the server timeout.
    KeepAliveSilence(Duration),
    /// A keep-alive ping could not be sent.
    KeepAlivePingFailed,
    /// An outbound send failed.
    SendFailed(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportClosed => write!(f, "transport closed"),
            Self::TransportError(e) => write!(f, "transport error: {}", e),
            Self::ServerClosed(Some(e)) => write!(f, "server closed connection: {}", e),
            Self::ServerClosed(None) => write!(f, "server closed connection"),
            Self::KeepAliveSilence(silence) => {
                write!(f, "no message from server for {:?}", silence)
            }
            Self::KeepAlivePingFailed => write!(f, "keep-alive ping failed"),
            Self::SendFailed(e) => write!(f, "send failed: {}", e),
        }
    }
}

/// Events emitted by a hub connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection moved between lifecycle states.
    StateTransition {
        connection_name: String,
        timestamp: Instant,
        from_state: ConnectionState,
        to_state: ConnectionState,
    },
    /// A connected link was lost.
    ConnectionLost {
        connection_name: String,
        timestamp: Instant,
        reason: DisconnectReason,
    },
    /// A reconnection attempt is scheduled after `delay`.
    ReconnectAttempt {
        connection_name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// A reconnection attempt failed; the policy will be consulted again.
    ReconnectFailed {
        connection_name: String,
        timestamp: Instant,
        attempt: u32,
        reason: String,
    },
    /// The reconnection policy gave up; the connection is closing.
    ReconnectExhausted {
        connection_name: String,
        timestamp: Instant,
        attempts: u32,
    },
}

impl HubEvent for ConnectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::StateTransition { .. } => "state_transition",
            ConnectionEvent::ConnectionLost { .. } => "connection_lost",
            ConnectionEvent::ReconnectAttempt { .. } => "reconnect_attempt",
            ConnectionEvent::ReconnectFailed { .. } => "reconnect_failed",
            ConnectionEvent::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ConnectionEvent::StateTransition { timestamp, .. }
            | ConnectionEvent::ConnectionLost { timestamp, .. }
            | ConnectionEvent::ReconnectAttempt { timestamp, .. }
            | ConnectionEvent::ReconnectFailed { timestamp, .. }
            | ConnectionEvent::ReconnectExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn connection_name(&self) -> &str {
        match self {
            ConnectionEvent::StateTransition {
                connection_name, ..
            }
            | ConnectionEvent::ConnectionLost {
                connection_name, ..
            }
            | ConnectionEvent::ReconnectAttempt {
                connection_name, ..
            }
            | ConnectionEvent::ReconnectFailed {
                connection_name, ..
            }
            | ConnectionEvent::ReconnectExhausted {
                connection_name, ..
            } => connection_name,
        }
    }
}

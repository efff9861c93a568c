//! Error types for hub connections.

use crate::state::ConnectionState;
use std::time::Duration;
use thiserror::Error;

/// Returned by a reconnection policy that has no further attempts to offer.
///
/// Exhaustion is terminal: once a policy returns this error, every later call
/// returns it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reconnection policy exhausted after {attempts} attempts")]
pub struct PolicyExhausted {
    /// Number of attempts the policy handed out before giving up.
    pub attempts: u32,
}

/// Errors raised while validating reconnect or connection configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An interval policy was configured without any intervals.
    #[error("interval reconnection requires at least one interval")]
    EmptyIntervals,

    /// An interval in the configured list is zero, negative, or not finite.
    #[error("reconnect interval at position {index} must be a positive duration")]
    NonPositiveInterval {
        /// Position of the offending interval.
        index: usize,
    },

    /// A duration setting is zero, negative, or not finite.
    #[error("{field} must be a positive duration")]
    NonPositiveDuration {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// The structured reconnect option could not be parsed.
    #[error("invalid reconnect configuration: {0}")]
    Invalid(String),
}

/// Errors reported by a transport while opening, sending, or closing.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link has been closed.
    #[error("transport is closed")]
    Closed,

    /// The remote endpoint refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The protocol handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// An I/O error from the underlying socket.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`HubConnection`](crate::HubConnection) operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A requested state change is illegal from the current state.
    ///
    /// Indicates a defect when observed outside of racing `start`/`stop` calls.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// State at the time of the request.
        from: ConnectionState,
        /// Requested target state.
        to: ConnectionState,
    },

    /// The reconnection policy ran out of attempts.
    #[error(transparent)]
    PolicyExhausted(#[from] PolicyExhausted),

    /// A message was sent while the connection was not connected.
    #[error("cannot send while connection is {state}")]
    NotConnected {
        /// State at the time of the send.
        state: ConnectionState,
    },

    /// `stop` was called before the first link was established.
    #[error("connection was stopped before it connected")]
    Stopped,

    /// `start` was called more than once.
    #[error("connection has already been started")]
    AlreadyStarted,

    /// The transport did not complete its handshake in time.
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectionError {
    /// Returns true if the error is the send-while-disconnected guard.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, ConnectionError::NotConnected { .. })
    }

    /// Returns true if `stop` ended the connection before `start` completed.
    pub fn is_stopped(&self) -> bool {
        matches!(self, ConnectionError::Stopped)
    }

    /// Returns true if the error is an illegal state transition.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, ConnectionError::InvalidTransition { .. })
    }
}

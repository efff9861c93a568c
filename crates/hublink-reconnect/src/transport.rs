//! Transport capability consumed by hub connections.
//!
//! A [`Transport`] knows how to open a fresh link to the hub, covering both
//! the socket and the protocol handshake. Each successful open yields a
//! [`TransportSession`]: the [`TransportLink`] used for outbound messages and
//! a channel of inbound [`TransportEvent`]s. Wire framing and TLS live behind
//! these traits.

pub mod memory;

use crate::error::TransportError;
use serde_json::Value;
use std::future::Future;
use tokio::sync::mpsc;

pub use memory::{MemoryHub, MemoryLink, MemoryTransport};

/// A message exchanged with the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// A named invocation with positional arguments.
    Invocation {
        /// Name of the method being invoked.
        target: String,
        /// Positional arguments.
        arguments: Vec<Value>,
    },

    /// Keep-alive probe. Carries no payload.
    Ping,

    /// The hub is closing the connection.
    Close {
        /// Error reported by the hub, if any.
        error: Option<String>,
    },
}

impl HubMessage {
    /// Convenience constructor for an invocation.
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        HubMessage::Invocation {
            target: target.into(),
            arguments,
        }
    }
}

/// Inbound notifications from an open link.
#[derive(Debug)]
pub enum TransportEvent {
    /// A message from the hub.
    Message(HubMessage),

    /// The link failed; no further events will follow.
    Error(TransportError),

    /// The link closed cleanly.
    Closed,
}

/// An open, handshaken link.
#[derive(Debug)]
pub struct TransportSession<L> {
    /// Outbound half.
    pub link: L,
    /// Inbound events. Dropping the sender side ends the session.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens links to a hub.
///
/// A connection owns exactly one transport and calls [`open`](Self::open)
/// once for the initial connect and once per reconnection attempt.
pub trait Transport: Send + Sync + 'static {
    /// The outbound half of an open link.
    type Link: TransportLink;

    /// Opens a link and completes the handshake.
    fn open(
        &self,
    ) -> impl Future<Output = Result<TransportSession<Self::Link>, TransportError>> + Send;
}

/// Outbound half of an open link.
pub trait TransportLink: Send + Sync + 'static {
    /// Sends one message.
    fn send(&self, message: HubMessage) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the link. Idempotent.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

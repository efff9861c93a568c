//! In-memory transport for tests and examples.
//!
//! A [`MemoryHub`] plays the server side: it decides whether opens succeed,
//! pushes invocations to the current link, drops or fails that link, and
//! records everything the client sends. [`MemoryHub::transport`] hands out
//! the client side.
//!
//! ```rust
//! use hublink_reconnect::transport::{MemoryHub, Transport, TransportLink, HubMessage};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let hub = MemoryHub::new();
//! let session = hub.transport().open().await.unwrap();
//! session.link.send(HubMessage::invocation("SendMessage", vec![])).await.unwrap();
//! assert_eq!(hub.sent_invocations().len(), 1);
//! # }
//! ```

use super::{HubMessage, Transport, TransportEvent, TransportLink, TransportSession};
use crate::error::TransportError;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 64;

struct Current {
    id: u64,
    events: mpsc::Sender<TransportEvent>,
}

struct HubState {
    accepting: bool,
    refuse_next: u32,
    open_delay: Duration,
    reply_to_pings: bool,
    next_id: u64,
    open_attempts: usize,
    current: Option<Current>,
    sent: Vec<HubMessage>,
    routes: HashMap<String, String>,
    drop_on: HashSet<String>,
}

impl HubState {
    fn current_sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.current.as_ref().map(|c| c.events.clone())
    }
}

/// Server side of the in-memory transport.
///
/// Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    /// Creates a hub that accepts every open and answers pings.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                accepting: true,
                refuse_next: 0,
                open_delay: Duration::ZERO,
                reply_to_pings: true,
                next_id: 0,
                open_attempts: 0,
                current: None,
                sent: Vec::new(),
                routes: HashMap::new(),
                drop_on: HashSet::new(),
            })),
        }
    }

    /// Returns a client-side transport bound to this hub.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            state: Arc::clone(&self.state),
        }
    }

    /// Accepts or refuses every subsequent open.
    pub fn set_accepting(&self, accepting: bool) {
        self.state.lock().accepting = accepting;
    }

    /// Refuses the next `count` opens, then falls back to [`set_accepting`](Self::set_accepting).
    pub fn refuse_next(&self, count: u32) {
        self.state.lock().refuse_next = count;
    }

    /// Delays every open by `delay` before it is accepted or refused.
    pub fn set_open_delay(&self, delay: Duration) {
        self.state.lock().open_delay = delay;
    }

    /// Controls whether client pings are echoed back.
    pub fn set_reply_to_pings(&self, reply: bool) {
        self.state.lock().reply_to_pings = reply;
    }

    /// Answers every client invocation of `from` with an invocation of `to`
    /// carrying the same arguments.
    pub fn route(&self, from: impl Into<String>, to: impl Into<String>) {
        self.state.lock().routes.insert(from.into(), to.into());
    }

    /// Drops the current link whenever the client invokes `target`.
    pub fn disconnect_on(&self, target: impl Into<String>) {
        self.state.lock().drop_on.insert(target.into());
    }

    /// Pushes an invocation to the current link. Returns false if none is open.
    pub fn push(&self, target: impl Into<String>, arguments: Vec<Value>) -> bool {
        self.deliver(TransportEvent::Message(HubMessage::invocation(
            target, arguments,
        )))
    }

    /// Sends a ping to the current link.
    pub fn ping(&self) -> bool {
        self.deliver(TransportEvent::Message(HubMessage::Ping))
    }

    /// Drops the current link without a close message, as a lost socket would.
    pub fn disconnect(&self) -> bool {
        self.state.lock().current.take().is_some()
    }

    /// Reports `error` on the current link and drops it.
    pub fn fail(&self, error: TransportError) -> bool {
        match self.state.lock().current.take() {
            Some(current) => {
                let _ = current.events.try_send(TransportEvent::Error(error));
                true
            }
            None => false,
        }
    }

    /// Sends a close message on the current link and drops it.
    pub fn close_with(&self, error: Option<String>) -> bool {
        match self.state.lock().current.take() {
            Some(current) => {
                let _ = current
                    .events
                    .try_send(TransportEvent::Message(HubMessage::Close { error }));
                true
            }
            None => false,
        }
    }

    /// Every message the client sent, pings included, in order.
    pub fn sent(&self) -> Vec<HubMessage> {
        self.state.lock().sent.clone()
    }

    /// The invocations the client sent, in order.
    pub fn sent_invocations(&self) -> Vec<(String, Vec<Value>)> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|message| match message {
                HubMessage::Invocation { target, arguments } => {
                    Some((target.clone(), arguments.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of opens attempted so far, refused ones included.
    pub fn open_attempts(&self) -> usize {
        self.state.lock().open_attempts
    }

    /// Returns true if a link is currently open.
    pub fn is_connected(&self) -> bool {
        self.state.lock().current.is_some()
    }

    fn deliver(&self, event: TransportEvent) -> bool {
        let Some(sender) = self.state.lock().current_sender() else {
            return false;
        };
        sender.try_send(event).is_ok()
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryHub")
            .field("accepting", &state.accepting)
            .field("connected", &state.current.is_some())
            .field("open_attempts", &state.open_attempts)
            .finish()
    }
}

/// Client side of the in-memory transport.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<HubState>>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport").finish_non_exhaustive()
    }
}

impl Transport for MemoryTransport {
    type Link = MemoryLink;

    async fn open(&self) -> Result<TransportSession<MemoryLink>, TransportError> {
        let delay = self.state.lock().open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.open_attempts += 1;
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(TransportError::Refused("hub refused the connection".into()));
        }
        if !state.accepting {
            return Err(TransportError::Refused("hub is not accepting connections".into()));
        }

        state.next_id += 1;
        let id = state.next_id;
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        // Replacing the previous sender ends that link's event stream.
        state.current = Some(Current { id, events });

        Ok(TransportSession {
            link: MemoryLink {
                id,
                state: Arc::clone(&self.state),
            },
            events: receiver,
        })
    }
}

/// Outbound half of an in-memory link.
pub struct MemoryLink {
    id: u64,
    state: Arc<Mutex<HubState>>,
}

impl MemoryLink {
    /// Identifier of this link, unique per hub.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink").field("id", &self.id).finish()
    }
}

impl TransportLink for MemoryLink {
    async fn send(&self, message: HubMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let events = match &state.current {
            Some(current) if current.id == self.id => current.events.clone(),
            _ => return Err(TransportError::Closed),
        };

        let drop_link = matches!(&message, HubMessage::Invocation { target, .. } if state.drop_on.contains(target));
        if drop_link {
            state.sent.push(message);
            state.current = None;
            return Ok(());
        }

        let reply = match &message {
            HubMessage::Ping if state.reply_to_pings => Some(HubMessage::Ping),
            HubMessage::Invocation { target, arguments } => state
                .routes
                .get(target)
                .map(|to| HubMessage::invocation(to.clone(), arguments.clone())),
            _ => None,
        };
        state.sent.push(message);

        if let Some(reply) = reply {
            let _ = events.try_send(TransportEvent::Message(reply));
        }
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        if state.current.as_ref().is_some_and(|c| c.id == self.id) {
            state.current = None;
        }
    }
}

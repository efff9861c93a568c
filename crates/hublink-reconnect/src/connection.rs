//! Hub connection: lifecycle, inbound dispatch, and the send guard.

use crate::builder::HubConnectionBuilder;
use crate::error::ConnectionError;
use crate::events::{ConnectionEvent, DisconnectReason};
use crate::keepalive::{KeepAliveFailure, KeepAliveMonitor};
use crate::orchestrator;
use crate::policy::ReconnectPolicy;
use crate::state::{ConnectionState, ConnectionStateMachine};
use crate::transport::{HubMessage, Transport, TransportEvent, TransportLink, TransportSession};
use hublink_core::{EventListener, FnListener, HandlerRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

struct LinkSlot<L> {
    epoch: u64,
    link: Arc<L>,
    receiver: Option<JoinHandle<()>>,
}

pub(crate) struct Inner<T: Transport> {
    pub(crate) name: String,
    pub(crate) transport: T,
    pub(crate) state: ConnectionStateMachine,
    pub(crate) policy: Option<Mutex<ReconnectPolicy>>,
    pub(crate) handshake_timeout: Duration,
    handlers: HandlerRegistry,
    keep_alive: KeepAliveMonitor,
    link: Mutex<Option<LinkSlot<T::Link>>>,
    epoch: AtomicU64,
    started: AtomicBool,
    stop_tx: watch::Sender<bool>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Inner<T> {
    pub(crate) fn new(
        name: String,
        transport: T,
        state: ConnectionStateMachine,
        policy: Option<ReconnectPolicy>,
        keep_alive: KeepAliveMonitor,
        handshake_timeout: Duration,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            name,
            transport,
            state,
            policy: policy.map(Mutex::new),
            handshake_timeout,
            handlers: HandlerRegistry::new(),
            keep_alive,
            link: Mutex::new(None),
            epoch: AtomicU64::new(0),
            started: AtomicBool::new(false),
            stop_tx,
            reconnect_task: Mutex::new(None),
        }
    }

    /// Installs a freshly opened session and moves to Connected.
    ///
    /// Fails only when the connection was stopped while the session was
    /// being opened; the session is closed in that case.
    pub(crate) async fn activate(
        self: &Arc<Self>,
        session: TransportSession<T::Link>,
    ) -> Result<(), ConnectionError> {
        let TransportSession { link, events } = session;
        let link = Arc::new(link);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        *self.link.lock() = Some(LinkSlot {
            epoch,
            link: Arc::clone(&link),
            receiver: None,
        });

        if let Err(err) = self.state.transition(ConnectionState::Connected) {
            self.take_link(epoch);
            link.close().await;
            return Err(err);
        }

        let installed = {
            let mut slot = self.link.lock();
            match slot.as_mut() {
                Some(slot) if slot.epoch == epoch => {
                    let weak = Arc::downgrade(self);
                    self.keep_alive.arm(Arc::clone(&link), move |failure| {
                        if let Some(inner) = weak.upgrade() {
                            inner.handle_disconnect(epoch, failure.into());
                        }
                    });
                    slot.receiver = Some(tokio::spawn(receive_loop(
                        Arc::downgrade(self),
                        epoch,
                        events,
                    )));
                    true
                }
                // Lost or stopped from inside an on-open callback.
                _ => false,
            }
        };
        if !installed {
            link.close().await;
        }
        Ok(())
    }

    /// Tears down the link of `epoch` and hands off to reconnection.
    ///
    /// Reports from a replaced link, and repeated reports for the same link,
    /// are ignored.
    pub(crate) fn handle_disconnect(self: &Arc<Self>, epoch: u64, reason: DisconnectReason) {
        let lost = self.state.serialized(|| {
            self.epoch.load(Ordering::SeqCst) == epoch
                && self.state.transition(ConnectionState::Disconnected).is_ok()
        });
        if !lost {
            #[cfg(feature = "tracing")]
            tracing::debug!(connection = %self.name, epoch, reason = %reason, "ignoring disconnect report");
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(connection = %self.name, reason = %reason, "connection lost");

        self.state.emit(&ConnectionEvent::ConnectionLost {
            connection_name: self.name.clone(),
            timestamp: Instant::now(),
            reason,
        });

        self.keep_alive.disarm();
        if let Some(slot) = self.take_link(epoch) {
            if let Some(receiver) = slot.receiver {
                receiver.abort();
            }
            tokio::spawn(async move { slot.link.close().await });
        }

        if self.policy.is_none() {
            self.state.close();
            return;
        }
        if self.state.transition(ConnectionState::Reconnecting).is_ok() {
            let task = tokio::spawn(orchestrator::run(
                Arc::downgrade(self),
                self.stop_tx.subscribe(),
            ));
            // Any earlier retry loop ended when it reactivated the lost link.
            *self.reconnect_task.lock() = Some(task);
        }
    }

    /// Moves to Closed, firing on-close if this call performed the transition.
    pub(crate) fn close(&self) -> bool {
        self.state.close()
    }

    fn take_link(&self, epoch: u64) -> Option<LinkSlot<T::Link>> {
        let mut slot = self.link.lock();
        match slot.as_ref() {
            Some(current) if current.epoch == epoch => slot.take(),
            _ => None,
        }
    }

    fn current_link(&self) -> Option<(u64, Arc<T::Link>)> {
        self.link
            .lock()
            .as_ref()
            .map(|slot| (slot.epoch, Arc::clone(&slot.link)))
    }
}

impl<T: Transport> Drop for Inner<T> {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
        if let Some(slot) = self.link.get_mut().take() {
            if let Some(receiver) = slot.receiver {
                receiver.abort();
            }
        }
        if let Some(task) = self.reconnect_task.get_mut().take() {
            task.abort();
        }
    }
}

impl From<KeepAliveFailure> for DisconnectReason {
    fn from(failure: KeepAliveFailure) -> Self {
        match failure {
            KeepAliveFailure::Silence(silence) => DisconnectReason::KeepAliveSilence(silence),
            KeepAliveFailure::PingFailed => DisconnectReason::KeepAlivePingFailed,
        }
    }
}

async fn receive_loop<T: Transport>(
    connection: Weak<Inner<T>>,
    epoch: u64,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    let reason = loop {
        let Some(event) = events.recv().await else {
            break DisconnectReason::TransportClosed;
        };
        let Some(inner) = connection.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Message(HubMessage::Invocation { target, arguments }) => {
                inner.keep_alive.record_activity();
                inner.handlers.dispatch(&target, &arguments);
            }
            TransportEvent::Message(HubMessage::Ping) => inner.keep_alive.record_activity(),
            TransportEvent::Message(HubMessage::Close { error }) => {
                break DisconnectReason::ServerClosed(error);
            }
            TransportEvent::Error(err) => break DisconnectReason::TransportError(err.to_string()),
            TransportEvent::Closed => break DisconnectReason::TransportClosed,
        }
    };

    if let Some(inner) = connection.upgrade() {
        inner.handle_disconnect(epoch, reason);
    }
}

/// A client connection to a hub that survives transient link loss.
///
/// Cloning yields another handle to the same connection. Callbacks may be
/// registered before or after [`start`](Self::start); callbacks registered
/// before `start` observe every later connect cycle, reconnections included.
///
/// # Examples
///
/// ```rust
/// use hublink_reconnect::{HubConnection, ReconnectConfig};
/// use hublink_reconnect::transport::MemoryHub;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let hub = MemoryHub::new();
/// let connection = HubConnection::builder(hub.transport())
///     .name("chat")
///     .with_automatic_reconnect(ReconnectConfig::interval([
///         Duration::from_millis(10),
///         Duration::from_millis(20),
///     ]))
///     .build()?;
///
/// connection.on_open(|| println!("connected"));
/// connection.on("ReceiveMessage", |args| println!("message: {:?}", args));
///
/// connection.start().await?;
/// connection.send("SendMessage", vec!["hello".into()]).await?;
/// connection.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct HubConnection<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for HubConnection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> HubConnection<T> {
    /// Starts building a connection over `transport`.
    pub fn builder(transport: T) -> HubConnectionBuilder<T> {
        HubConnectionBuilder::new(transport)
    }

    pub(crate) fn from_inner(inner: Inner<T>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Opens the first link.
    ///
    /// May be called once. If the initial open or handshake fails the
    /// connection moves to Closed (firing on-close) and the error is
    /// returned; reconnection only covers links that were once established.
    /// A [`stop`](Self::stop) issued before the link is up abandons the
    /// handshake and makes this return [`ConnectionError::Stopped`].
    pub async fn start(&self) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(ConnectionError::AlreadyStarted);
        }

        let mut stop = inner.stop_tx.subscribe();
        match inner.state.state() {
            ConnectionState::Connecting => {}
            ConnectionState::Closed => return Err(ConnectionError::Stopped),
            state => {
                return Err(ConnectionError::InvalidTransition {
                    from: state,
                    to: ConnectionState::Connected,
                })
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(connection = %inner.name, "opening hub connection");

        let opened = tokio::select! {
            biased;
            opened = tokio::time::timeout(inner.handshake_timeout, inner.transport.open()) => opened,
            _ = orchestrator::stop_requested(&mut stop) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(connection = %inner.name, "initial handshake abandoned by stop");
                return Err(ConnectionError::Stopped);
            }
        };

        let err = match opened {
            Ok(Ok(session)) => {
                return match inner.activate(session).await {
                    // Stopped between the open completing and activation.
                    Err(ConnectionError::InvalidTransition {
                        from: ConnectionState::Closed,
                        ..
                    }) => Err(ConnectionError::Stopped),
                    outcome => outcome,
                };
            }
            Ok(Err(err)) => ConnectionError::Transport(err),
            Err(_) => ConnectionError::HandshakeTimeout(inner.handshake_timeout),
        };

        #[cfg(feature = "tracing")]
        tracing::warn!(connection = %inner.name, error = %err, "failed to open hub connection");

        inner.close();
        Err(err)
    }

    /// Closes the connection for good. Idempotent.
    ///
    /// Wins over any reconnection in progress: a pending wait or handshake is
    /// abandoned and any link opened afterwards is closed again.
    pub async fn stop(&self) {
        let inner = &self.inner;
        if inner.close() {
            #[cfg(feature = "tracing")]
            tracing::info!(connection = %inner.name, "hub connection stopped");
        }
        inner.stop_tx.send_replace(true);

        let slot = inner.link.lock().take();
        // Disarm after taking the slot so an activation cannot re-arm behind us.
        inner.keep_alive.disarm();
        if let Some(slot) = slot {
            if let Some(receiver) = slot.receiver {
                receiver.abort();
            }
            slot.link.close().await;
        }

        let task = inner.reconnect_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Invokes `method` on the hub.
    ///
    /// Fails immediately with [`ConnectionError::NotConnected`] unless the
    /// connection is Connected; nothing is queued. A transport failure while
    /// sending is treated as a lost link.
    pub async fn send(&self, method: &str, arguments: Vec<Value>) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        let state = inner.state.state();
        if state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected { state });
        }
        let Some((epoch, link)) = inner.current_link() else {
            return Err(ConnectionError::NotConnected {
                state: inner.state.state(),
            });
        };

        match link.send(HubMessage::invocation(method, arguments)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                inner.handle_disconnect(epoch, DisconnectReason::SendFailed(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Registers a handler for invocations of `target` pushed by the hub.
    pub fn on<F>(&self, target: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.inner.handlers.register(target, handler);
    }

    /// Removes every handler registered for `target`, returning how many.
    pub fn off(&self, target: &str) -> usize {
        self.inner.handlers.remove(target)
    }

    /// Called on every transition into Connected, reconnections included.
    pub fn on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_state(ConnectionState::Connected, f);
    }

    /// Called once, when the connection reaches Closed.
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_state(ConnectionState::Closed, f);
    }

    /// Called each time a lost link enters reconnection.
    pub fn on_reconnecting<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_state(ConnectionState::Reconnecting, f);
    }

    /// Subscribes to every [`ConnectionEvent`].
    pub fn on_event<L>(&self, listener: L)
    where
        L: EventListener<ConnectionEvent> + 'static,
    {
        self.inner.state.subscribe(listener);
    }

    fn on_state<F>(&self, target: ConnectionState, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .state
            .subscribe(FnListener::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::StateTransition { to_state, .. } = event {
                    if *to_state == target {
                        f();
                    }
                }
            }));
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.state()
    }

    /// Returns true if sends are currently allowed.
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// Name carried by this connection's events and logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Attempts handed out by the reconnection policy so far, if one is configured.
    pub fn reconnect_attempts(&self) -> Option<u32> {
        self.inner
            .policy
            .as_ref()
            .map(|policy| policy.lock().attempts())
    }
}

impl<T: Transport> std::fmt::Debug for HubConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.state())
            .field("handlers", &self.inner.handlers)
            .finish()
    }
}

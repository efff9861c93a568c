//! Keep-alive monitor detecting silently lost links.

use crate::config::DEFAULT_KEEP_ALIVE_INTERVAL;
use crate::transport::{HubMessage, TransportLink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default silence after which the hub is presumed gone.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Why the keep-alive monitor gave up on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveFailure {
    /// Nothing arrived from the hub for the contained duration.
    Silence(Duration),

    /// A ping could not be written to the link.
    PingFailed,
}

/// Periodically pings the hub and watches for inbound silence.
///
/// At most one probe task runs at a time. Arming again replaces the previous
/// task; the task ends after reporting its first failure.
pub struct KeepAliveMonitor {
    name: String,
    interval: Duration,
    server_timeout: Duration,
    last_activity: Arc<Mutex<Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAliveMonitor {
    /// Creates a disarmed monitor for the connection called `name`.
    pub fn new(name: impl Into<String>, interval: Duration, server_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            server_timeout,
            last_activity: Arc::new(Mutex::new(Instant::now())),
            task: Mutex::new(None),
        }
    }

    /// Period between pings.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Silence tolerated before reporting [`KeepAliveFailure::Silence`].
    pub fn server_timeout(&self) -> Duration {
        self.server_timeout
    }

    /// Stamps inbound activity.
    pub fn record_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Starts probing `link`, calling `on_failure` once if it goes quiet or
    /// a ping cannot be sent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<L, F>(&self, link: Arc<L>, on_failure: F)
    where
        L: TransportLink,
        F: FnOnce(KeepAliveFailure) + Send + 'static,
    {
        self.record_activity();

        let last_activity = Arc::clone(&self.last_activity);
        let period = self.interval;
        let server_timeout = self.server_timeout;
        #[cfg(feature = "metrics")]
        let name = self.name.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let failure = loop {
                ticker.tick().await;

                let silence = last_activity.lock().elapsed();
                if silence > server_timeout {
                    break KeepAliveFailure::Silence(silence);
                }
                if link.send(HubMessage::Ping).await.is_err() {
                    break KeepAliveFailure::PingFailed;
                }
            };

            #[cfg(feature = "metrics")]
            metrics::counter!("hublink_keepalive_timeouts_total", "connection" => name).increment(1);

            on_failure(failure);
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stops probing. Safe to call when not armed.
    pub fn disarm(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Returns true while a probe task is running.
    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Default for KeepAliveMonitor {
    fn default() -> Self {
        Self::new("<unnamed>", DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_SERVER_TIMEOUT)
    }
}

impl Drop for KeepAliveMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for KeepAliveMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveMonitor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("server_timeout", &self.server_timeout)
            .field("armed", &self.is_armed())
            .finish()
    }
}

//! Retry loop run while a connection is Reconnecting.

use crate::connection::Inner;
use crate::error::ConnectionError;
use crate::events::ConnectionEvent;
use crate::state::ConnectionState;
use crate::transport::Transport;
use std::sync::Weak;
use std::time::Instant;
use tokio::sync::watch;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Consults the policy, waits, and reopens the transport until the link is
/// back, the policy gives up, or the connection is stopped.
///
/// Holds only a weak reference while waiting so that dropping every handle
/// to the connection ends the loop.
pub(crate) async fn run<T: Transport>(connection: Weak<Inner<T>>, mut stop: watch::Receiver<bool>) {
    loop {
        let Some(inner) = connection.upgrade() else {
            return;
        };
        let stopped = *stop.borrow();
        if stopped || inner.state.state() != ConnectionState::Reconnecting {
            return;
        }
        let Some(policy) = inner.policy.as_ref() else {
            return;
        };

        let (next, attempt) = {
            let mut policy = policy.lock();
            let next = policy.next();
            (next, policy.attempts())
        };

        let delay = match next {
            Ok(delay) => delay,
            Err(exhausted) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    connection = %inner.name,
                    attempts = exhausted.attempts,
                    "reconnection policy exhausted, closing connection"
                );

                #[cfg(feature = "metrics")]
                counter!("hublink_reconnect_exhausted_total", "connection" => inner.name.clone())
                    .increment(1);

                inner.close();
                inner.state.emit(&ConnectionEvent::ReconnectExhausted {
                    connection_name: inner.name.clone(),
                    timestamp: Instant::now(),
                    attempts: exhausted.attempts,
                });
                return;
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(connection = %inner.name, attempt, ?delay, "scheduling reconnection attempt");

        #[cfg(feature = "metrics")]
        counter!("hublink_reconnect_attempts_total", "connection" => inner.name.clone())
            .increment(1);

        inner.state.emit(&ConnectionEvent::ReconnectAttempt {
            connection_name: inner.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
        });
        drop(inner);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_requested(&mut stop) => return,
        }

        let Some(inner) = connection.upgrade() else {
            return;
        };
        if inner.state.state() != ConnectionState::Reconnecting {
            return;
        }

        let handshake_timeout = inner.handshake_timeout;
        // A session that completed is always taken, so activate can close it if stopped.
        let opened = tokio::select! {
            biased;
            opened = tokio::time::timeout(handshake_timeout, inner.transport.open()) => opened,
            _ = stop_requested(&mut stop) => return,
        };

        let reason = match opened {
            Ok(Ok(session)) => {
                if inner.activate(session).await.is_ok() {
                    #[cfg(feature = "tracing")]
                    tracing::info!(connection = %inner.name, attempt, "reconnected");
                }
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => ConnectionError::HandshakeTimeout(handshake_timeout).to_string(),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(connection = %inner.name, attempt, error = %reason, "reconnection attempt failed");

        inner.state.emit(&ConnectionEvent::ReconnectFailed {
            connection_name: inner.name.clone(),
            timestamp: Instant::now(),
            attempt,
            reason,
        });
    }
}

pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    // A dropped sender means the connection is gone, which also ends the loop.
    let _ = stop.wait_for(|stopped| *stopped).await;
}

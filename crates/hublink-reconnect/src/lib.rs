//! Hub connection client that survives transient link loss.
//!
//! A [`HubConnection`] keeps a persistent bidirectional link to a hub
//! endpoint: the application sends invocations, the hub pushes invocations
//! back to registered handlers. When the link drops unexpectedly (transport
//! error, server close, or keep-alive silence) an optional reconnection
//! policy decides how long to wait before each new attempt and when to give
//! up.
//!
//! # Features
//!
//! - **Interval reconnection**: walk a fixed list of waits once, in order
//! - **Raw reconnection**: a fixed wait, optionally bounded by an attempt budget
//! - **Lifecycle state machine**: Connecting, Connected, Disconnected,
//!   Reconnecting, Closed, with Closed terminal
//! - **Keep-alive**: periodic pings and silence detection
//! - **Event system**: every lifecycle fact is a [`ConnectionEvent`]
//! - **Pluggable transport**: anything implementing [`Transport`](transport::Transport);
//!   an in-memory transport ships for tests
//!
//! # Examples
//!
//! ## Interval reconnection from the structured option
//!
//! ```rust
//! use hublink_reconnect::{HubConnection, ReconnectConfig};
//! use hublink_reconnect::transport::MemoryHub;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconnectConfig::from_json(
//!     r#"{"type": "interval", "intervals": [1, 2, 4, 45, 6, 7, 8, 9, 10], "keep_alive_interval": 10}"#,
//! )?;
//!
//! let hub = MemoryHub::new();
//! let connection = HubConnection::builder(hub.transport())
//!     .with_automatic_reconnect(config)
//!     .build()?;
//!
//! connection.on_open(|| println!("open"));
//! connection.on_close(|| println!("closed"));
//! connection.start().await?;
//! connection.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Bounded raw reconnection
//!
//! ```rust
//! use hublink_reconnect::ReconnectConfig;
//! use std::time::Duration;
//!
//! let config = ReconnectConfig::raw(Some(5))
//!     .keep_alive_interval(Duration::from_secs(10));
//!
//! let mut policy = config.build_policy().unwrap();
//! assert_eq!(policy.next(), Ok(Duration::from_secs(10)));
//! ```
//!
//! # Feature Flags
//!
//! - `tracing` (default): lifecycle transitions at info, retry failures at
//!   debug, exhaustion at warn
//! - `metrics`: counters for state transitions, reconnection attempts,
//!   exhaustion, and keep-alive timeouts

mod builder;
mod config;
mod connection;
mod error;
mod events;
mod keepalive;
mod orchestrator;
mod policy;
mod state;
pub mod transport;

pub use builder::{HubConnectionBuilder, DEFAULT_HANDSHAKE_TIMEOUT};
pub use config::{ReconnectConfig, ReconnectStrategy, DEFAULT_KEEP_ALIVE_INTERVAL};
pub use connection::HubConnection;
pub use error::{ConfigError, ConnectionError, PolicyExhausted, TransportError};
pub use events::{ConnectionEvent, DisconnectReason};
pub use keepalive::{KeepAliveFailure, KeepAliveMonitor, DEFAULT_SERVER_TIMEOUT};
pub use policy::{IntervalPolicy, RawPolicy, ReconnectPolicy};
pub use state::{ConnectionState, ConnectionStateMachine};

pub use hublink_core::{EventListener, FnListener, HubEvent};

//! Stress tests for hublink
//!
//! ## What We Test
//!
//! - **Churn**: thousands of disconnect and reconnect cycles on one connection
//! - **Fan-out**: many connections reconnecting at once
//! - **Races**: stop racing reconnection, disconnect reports racing each other
//! - **Resource cleanup**: no leaked links or background tasks after stop


use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Utility: route connection logs to the test harness when RUST_LOG is set.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Utility: poll until `condition` holds or `limit` passes.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(1)).await;
    }
    condition()
}

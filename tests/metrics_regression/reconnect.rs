//! Reconnection metrics regression tests

use super::helpers::*;
use hublink_reconnect::transport::MemoryHub;
use hublink_reconnect::{ConnectionState, HubConnection, ReconnectConfig};
use serial_test::serial;
use std::time::Duration;
use tokio::time::sleep;

async fn wait_for_state(
    connection: &HubConnection<hublink_reconnect::transport::MemoryTransport>,
    state: ConnectionState,
) {
    for _ in 0..200 {
        if connection.state() == state {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("connection never reached {}", state);
}

#[tokio::test]
#[serial]
async fn state_transition_metrics_exist() {
    init_recorder();

    let hub = MemoryHub::new();
    let connection = HubConnection::builder(hub.transport())
        .name("metrics_transitions")
        .build()
        .unwrap();

    connection.start().await.unwrap();
    connection.stop().await;

    assert_counter_exists("hublink_state_transitions_total");
    assert_metric_has_label(
        "hublink_state_transitions_total",
        "connection",
        "metrics_transitions",
    );
    assert_metric_has_label("hublink_state_transitions_total", "from", "connecting");
    assert_metric_has_label("hublink_state_transitions_total", "to", "connected");
    assert_metric_has_label("hublink_state_transitions_total", "to", "closed");
}

#[tokio::test]
#[serial]
async fn reconnect_attempt_metrics_exist() {
    init_recorder();

    let hub = MemoryHub::new();
    let connection = HubConnection::builder(hub.transport())
        .name("metrics_attempts")
        .with_automatic_reconnect(ReconnectConfig::interval([Duration::from_millis(5)]))
        .build()
        .unwrap();

    connection.start().await.unwrap();
    hub.disconnect();
    wait_for_state(&connection, ConnectionState::Connected).await;
    sleep(Duration::from_millis(20)).await;
    wait_for_state(&connection, ConnectionState::Connected).await;

    assert_counter_exists("hublink_reconnect_attempts_total");
    assert_metric_has_label("hublink_reconnect_attempts_total", "connection", "metrics_attempts");
    assert_metric_has_label("hublink_state_transitions_total", "to", "reconnecting");

    connection.stop().await;
}

#[tokio::test]
#[serial]
async fn reconnect_exhausted_metrics_exist() {
    init_recorder();

    let hub = MemoryHub::new();
    let connection = HubConnection::builder(hub.transport())
        .name("metrics_exhausted")
        .with_automatic_reconnect(
            ReconnectConfig::raw(Some(1)).reconnect_interval(Duration::from_millis(5)),
        )
        .build()
        .unwrap();

    connection.start().await.unwrap();
    hub.set_accepting(false);
    hub.disconnect();
    wait_for_state(&connection, ConnectionState::Closed).await;
    sleep(Duration::from_millis(20)).await;

    assert_counter_exists("hublink_reconnect_exhausted_total");
    assert_metric_has_label(
        "hublink_reconnect_exhausted_total",
        "connection",
        "metrics_exhausted",
    );
}

#[tokio::test]
#[serial]
async fn keepalive_timeout_metrics_exist() {
    init_recorder();

    let hub = MemoryHub::new();
    hub.set_reply_to_pings(false);
    let connection = HubConnection::builder(hub.transport())
        .name("metrics_keepalive")
        .keep_alive_interval(Duration::from_millis(10))
        .server_timeout(Duration::from_millis(30))
        .build()
        .unwrap();

    connection.start().await.unwrap();
    wait_for_state(&connection, ConnectionState::Closed).await;

    assert_counter_exists("hublink_keepalive_timeouts_total");
    assert_metric_has_label(
        "hublink_keepalive_timeouts_total",
        "connection",
        "metrics_keepalive",
    );
}

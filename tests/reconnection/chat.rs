use super::{chat_hub, connect, counting, eventually};
use hublink_reconnect::{ConnectionState, ReconnectConfig, DEFAULT_HANDSHAKE_TIMEOUT};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

async fn disconnect_then_chat(config: ReconnectConfig) {
    let hub = chat_hub();
    let connection = connect(&hub, Some(config));

    let (opened, on_open) = counting();
    let (closed, on_close) = counting();
    connection.on_open(on_open);
    connection.on_close(on_close);

    let received = Arc::new(Mutex::new(Vec::<Vec<Value>>::new()));
    let r = Arc::clone(&received);
    connection.on("ReceiveMessage", move |args| r.lock().push(args.to_vec()));

    connection.start().await.unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    connection.send("DisconnectMe", vec![]).await.unwrap();
    assert!(eventually(ms(2000), || opened.load(Ordering::SeqCst) == 2).await);

    let message = "new message";
    connection
        .send("SendMessage", vec![json!("user"), json!(message)])
        .await
        .unwrap();

    assert!(eventually(ms(1000), || !received.lock().is_empty()).await);
    assert_eq!(received.lock()[0], vec![json!("user"), json!(message)]);
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    connection.stop().await;
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reconnect_interval_config() {
    disconnect_then_chat(
        ReconnectConfig::from_json(
            r#"{"type": "interval", "intervals": [0.01, 0.02, 0.04, 0.045, 0.06], "keep_alive_interval": 10}"#,
        )
        .unwrap(),
    )
    .await;
}

#[tokio::test]
async fn reconnect_raw_config() {
    disconnect_then_chat(
        ReconnectConfig::from_json(
            r#"{"type": "raw", "keep_alive_interval": 0.05, "max_attempts": 4}"#,
        )
        .unwrap(),
    )
    .await;
}

#[tokio::test(start_paused = true)]
async fn interval_schedule_reconnects_within_its_budget() {
    let intervals = [1u64, 2, 4, 45, 6, 7, 8, 9, 10];
    let hub = chat_hub();
    let connection = connect(
        &hub,
        Some(
            ReconnectConfig::from_json(
                r#"{"type": "interval", "intervals": [1, 2, 4, 45, 6, 7, 8, 9, 10], "keep_alive_interval": 10}"#,
            )
            .unwrap(),
        ),
    );

    let (opened, on_open) = counting();
    connection.on_open(on_open);
    let received = Arc::new(Mutex::new(Vec::<Vec<Value>>::new()));
    let r = Arc::clone(&received);
    connection.on("ReceiveMessage", move |args| r.lock().push(args.to_vec()));

    connection.start().await.unwrap();

    // The first two attempts are refused, the third (after 1 + 2 + 4 s) lands.
    hub.refuse_next(2);
    let lost_at = Instant::now();
    connection.send("DisconnectMe", vec![]).await.unwrap();

    let budget = intervals.iter().map(|&s| Duration::from_secs(s)).sum::<Duration>()
        + DEFAULT_HANDSHAKE_TIMEOUT;
    assert!(eventually(budget, || opened.load(Ordering::SeqCst) == 2).await);

    let elapsed = lost_at.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "reconnected after {:?}", elapsed);
    assert!(elapsed <= budget, "reconnected after {:?}", elapsed);
    assert_eq!(hub.open_attempts(), 4);
    assert_eq!(connection.reconnect_attempts(), Some(3));

    connection
        .send("SendMessage", vec![json!("user"), json!("back")])
        .await
        .unwrap();
    assert!(eventually(ms(100), || !received.lock().is_empty()).await);
    assert_eq!(received.lock()[0], vec![json!("user"), json!("back")]);

    connection.stop().await;
}

#[tokio::test]
async fn no_reconnect_closes_and_rejects_sends() {
    let hub = chat_hub();
    let connection = connect(&hub, None);

    let (opened, on_open) = counting();
    let (closed, on_close) = counting();
    connection.on_open(on_open);
    connection.on_close(on_close);

    connection.start().await.unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    connection.send("DisconnectMe", vec![]).await.unwrap();
    assert!(eventually(ms(1000), || closed.load(Ordering::SeqCst) == 1).await);
    assert_eq!(connection.state(), ConnectionState::Closed);

    let err = connection
        .send("SendMessage", vec![json!("user"), json!("lost")])
        .await
        .unwrap_err();
    assert!(err.is_not_connected());

    // Nothing reopens and on-close does not fire again.
    tokio::time::sleep(ms(50)).await;
    assert_eq!(hub.open_attempts(), 1);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sends_while_reconnecting_are_rejected_not_queued() {
    let hub = chat_hub();
    let connection = connect(&hub, Some(ReconnectConfig::interval([ms(200)])));
    let (opened, on_open) = counting();
    connection.on_open(on_open);

    connection.start().await.unwrap();
    connection.send("DisconnectMe", vec![]).await.unwrap();
    assert!(eventually(ms(500), || connection.state() == ConnectionState::Reconnecting).await);

    let err = connection
        .send("SendMessage", vec![json!("user"), json!("too early")])
        .await
        .unwrap_err();
    assert!(err.is_not_connected());

    assert!(eventually(ms(2000), || opened.load(Ordering::SeqCst) == 2).await);
    let targets: Vec<String> = hub
        .sent_invocations()
        .into_iter()
        .map(|(target, _)| target)
        .collect();
    assert_eq!(targets, vec!["DisconnectMe".to_string()]);

    connection.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_connections_share_nothing() {
    let connections: Vec<_> = (0..8)
        .map(|_| {
            let hub = chat_hub();
            let connection = connect(&hub, Some(ReconnectConfig::interval([ms(5), ms(5)])));
            (hub, connection)
        })
        .collect();

    futures::future::try_join_all(connections.iter().map(|(_, c)| c.start()))
        .await
        .unwrap();

    // Only every other hub drops its link.
    for (hub, _) in connections.iter().step_by(2) {
        hub.disconnect();
    }

    for (index, (hub, connection)) in connections.iter().enumerate() {
        let expected = if index % 2 == 0 { 2 } else { 1 };
        assert!(eventually(ms(1000), || hub.open_attempts() == expected && connection.state() == ConnectionState::Connected).await);
        connection.stop().await;
    }
}

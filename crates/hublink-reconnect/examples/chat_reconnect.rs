use hublink_reconnect::transport::MemoryHub;
use hublink_reconnect::{HubConnection, ReconnectConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Example of a chat client riding out a dropped link.
///
/// The in-memory hub echoes `SendMessage` back as `ReceiveMessage`. Halfway
/// through, the hub drops the link; the interval policy brings it back and
/// the same handlers keep receiving messages.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let hub = MemoryHub::new();
    hub.route("SendMessage", "ReceiveMessage");

    let config = ReconnectConfig::from_json(
        r#"{"type": "interval", "intervals": [0.1, 0.2, 0.4], "keep_alive_interval": 5}"#,
    )?;

    let connection = HubConnection::builder(hub.transport())
        .name("chat")
        .with_automatic_reconnect(config)
        .on_reconnect_attempt(|attempt, delay| {
            println!("reconnect attempt {} in {:?}", attempt, delay);
        })
        .build()?;

    let opened = Arc::new(Notify::new());
    let o = Arc::clone(&opened);
    connection.on_open(move || {
        println!("connection open");
        o.notify_one();
    });
    connection.on_close(|| println!("connection closed"));
    connection.on_reconnecting(|| println!("connection lost, reconnecting"));
    connection.on("ReceiveMessage", |args| println!("received: {:?}", args));

    connection.start().await?;
    opened.notified().await;
    connection
        .send("SendMessage", vec!["alice".into(), "hello".into()])
        .await?;

    println!("\nhub drops the link\n");
    hub.disconnect();
    opened.notified().await;

    connection
        .send("SendMessage", vec!["alice".into(), "still here".into()])
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    connection.stop().await;
    Ok(())
}

use hublink_reconnect::ReconnectConfig;
use std::time::Duration;

/// Example walking through the reconnection policies.
///
/// - Interval: each configured wait is used once, in order
/// - Raw, bounded: a fixed wait, a fixed number of times
/// - Raw, unbounded: a fixed wait, forever
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Reconnection policies\n");

    println!("1. Interval policy");
    let config = ReconnectConfig::from_json(
        r#"{"type": "interval", "intervals": [1, 2, 4, 45, 6, 7, 8, 9, 10], "keep_alive_interval": 10}"#,
    )?;
    let mut policy = config.build_policy()?;
    while let Ok(wait) = policy.next() {
        println!("   wait {:?}", wait);
    }
    println!("   exhausted after {} attempts\n", policy.attempts());

    println!("2. Raw policy with a budget of 5");
    let config = ReconnectConfig::from_json(
        r#"{"type": "raw", "keep_alive_interval": 10, "max_attempts": 5}"#,
    )?;
    let mut policy = config.build_policy()?;
    while let Ok(wait) = policy.next() {
        println!("   attempt {} after {:?}", policy.attempts(), wait);
    }
    println!("   exhausted: {}\n", policy.is_exhausted());

    println!("3. Unbounded raw policy with an explicit wait");
    let config = ReconnectConfig::raw(None).reconnect_interval(Duration::from_millis(500));
    let mut policy = config.build_policy()?;
    for _ in 0..1000 {
        policy.next()?;
    }
    println!("   still going after {} attempts", policy.attempts());

    println!("\n4. Invalid options are rejected");
    for json in [
        r#"{"type": "interval", "intervals": []}"#,
        r#"{"type": "interval", "intervals": [1, 0]}"#,
        r#"{"type": "exponential"}"#,
    ] {
        match ReconnectConfig::from_json(json) {
            Ok(_) => println!("   {} accepted", json),
            Err(e) => println!("   {} -> {}", json, e),
        }
    }

    Ok(())
}

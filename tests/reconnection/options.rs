use hublink_reconnect::{ConfigError, ReconnectConfig, ReconnectStrategy};
use serde_json::json;
use std::time::Duration;

#[test]
fn interval_option_with_fractional_seconds() {
    let config = ReconnectConfig::from_value(json!({
        "type": "interval",
        "intervals": [0.05, 0.1, 1.5],
        "keep_alive_interval": 10
    }))
    .unwrap();

    assert_eq!(
        config.strategy(),
        &ReconnectStrategy::Interval {
            intervals: vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(1500),
            ]
        }
    );
    assert_eq!(config.keep_alive(), Some(Duration::from_secs(10)));
}

#[test]
fn raw_option_waits_keep_alive_interval() {
    let config = ReconnectConfig::from_json(
        r#"{"type": "raw", "keep_alive_interval": 10, "max_attempts": 5}"#,
    )
    .unwrap();

    let mut policy = config.build_policy().unwrap();
    let waits: Vec<_> = std::iter::from_fn(|| policy.next().ok()).collect();
    assert_eq!(waits, vec![Duration::from_secs(10); 5]);
}

#[test]
fn option_deserializes_inside_larger_document() {
    let configs: Vec<ReconnectConfig> = serde_json::from_value(json!([
        {"type": "interval", "intervals": [1, 2]},
        {"type": "raw", "max_attempts": 3},
        {}
    ]))
    .unwrap();

    assert_eq!(configs.len(), 3);
    assert_eq!(configs[1], ReconnectConfig::raw(Some(3)));
    assert_eq!(configs[2], ReconnectConfig::raw(None));

    // Validation still runs when nested.
    let nested: Result<Vec<ReconnectConfig>, _> =
        serde_json::from_value(json!([{"type": "interval", "intervals": []}]));
    assert!(nested.is_err());
}

#[test]
fn invalid_options_are_rejected() {
    let cases = [
        (r#"{"type": "interval", "intervals": []}"#, ConfigError::EmptyIntervals),
        (
            r#"{"type": "interval", "intervals": [1, 2, 0]}"#,
            ConfigError::NonPositiveInterval { index: 2 },
        ),
        (
            r#"{"type": "raw", "reconnect_interval": -1}"#,
            ConfigError::NonPositiveDuration {
                field: "reconnect_interval",
            },
        ),
        (
            r#"{"type": "raw", "keep_alive_interval": 0}"#,
            ConfigError::NonPositiveDuration {
                field: "keep_alive_interval",
            },
        ),
    ];

    for (json, expected) in cases {
        assert_eq!(ReconnectConfig::from_json(json).unwrap_err(), expected, "{}", json);
    }

    assert!(matches!(
        ReconnectConfig::from_json(r#"{"type": "interval", "intervals": "soon"}"#),
        Err(ConfigError::Invalid(_))
    ));
}

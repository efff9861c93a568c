//! Property tests for reconnection policies built from configuration.
//!
//! Invariants tested:
//! - Interval configuration yields exactly the configured waits
//! - Raw configuration yields exactly `max_attempts` waits
//! - Configuration validation rejects every non-positive interval

use hublink_reconnect::{ConfigError, ReconnectConfig};
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: interval configuration hands out its list verbatim
    #[test]
    fn interval_config_yields_configured_waits(
        millis in prop::collection::vec(1u64..100_000, 1..16),
    ) {
        let seconds: Vec<f64> = millis.iter().map(|&m| m as f64 / 1000.0).collect();
        let config = ReconnectConfig::from_value(json!({
            "type": "interval",
            "intervals": seconds,
        }))
        .unwrap();

        let mut policy = config.build_policy().unwrap();
        let waits: Vec<Duration> = std::iter::from_fn(|| policy.next().ok()).collect();

        prop_assert_eq!(waits.len(), millis.len());
        for (wait, expected) in waits.iter().zip(&millis) {
            let delta = wait.as_secs_f64() - (*expected as f64 / 1000.0);
            prop_assert!(delta.abs() < 1e-6, "wait {:?} vs {}ms", wait, expected);
        }
    }

    /// Property: raw configuration permits exactly max_attempts waits
    #[test]
    fn raw_config_permits_max_attempts(
        keep_alive in 1u64..60,
        max_attempts in 0u32..100,
    ) {
        let config = ReconnectConfig::from_value(json!({
            "type": "raw",
            "keep_alive_interval": keep_alive,
            "max_attempts": max_attempts,
        }))
        .unwrap();

        let mut policy = config.build_policy().unwrap();
        let waits: Vec<Duration> = std::iter::from_fn(|| policy.next().ok()).collect();

        prop_assert_eq!(waits.len(), max_attempts as usize);
        prop_assert!(waits.iter().all(|w| *w == Duration::from_secs(keep_alive)));
    }

    /// Property: a non-positive interval anywhere in the list is reported by position
    #[test]
    fn non_positive_interval_is_located(
        mut seconds in prop::collection::vec(0.001f64..100.0, 1..10),
        bad in prop_oneof![Just(0.0f64), Just(-1.0f64), Just(-0.5f64)],
        index in any::<prop::sample::Index>(),
    ) {
        let position = index.index(seconds.len());
        seconds[position] = bad;

        let err = ReconnectConfig::from_value(json!({
            "type": "interval",
            "intervals": seconds,
        }))
        .unwrap_err();

        prop_assert_eq!(err, ConfigError::NonPositiveInterval { index: position });
    }
}

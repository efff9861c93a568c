use hublink_reconnect::{ReconnectConfig, ReconnectPolicy};
use std::time::Duration;

#[test]
fn raw_policy_with_budget_then_exhausts() {
    let mut policy = ReconnectPolicy::raw(Duration::from_secs(5), Some(10)).unwrap();

    for attempt in 1..=10 {
        assert_eq!(policy.next(), Ok(Duration::from_secs(5)), "attempt {}", attempt);
    }
    let err = policy.next().unwrap_err();
    assert_eq!(err.attempts, 10);
    assert!(policy.is_exhausted());
}

#[test]
fn raw_policy_without_budget_never_exhausts() {
    let mut policy = ReconnectPolicy::raw(Duration::from_secs(5), None).unwrap();

    for _ in 0..10_000 {
        assert!(policy.next().is_ok());
    }
    assert!(!policy.is_exhausted());
}

#[test]
fn interval_policy_uses_each_interval_once() {
    let intervals: Vec<Duration> = [1, 2, 4, 45, 6, 7, 8, 9, 10]
        .into_iter()
        .map(Duration::from_secs)
        .collect();
    let mut policy = ReconnectPolicy::interval(intervals.clone()).unwrap();

    for expected in &intervals {
        assert_eq!(policy.next().unwrap(), *expected);
    }
    assert!(policy.next().is_err());
    assert!(policy.next().is_err());
}

#[test]
fn each_build_gets_a_fresh_policy() {
    let config = ReconnectConfig::interval([Duration::from_millis(100)]);

    let mut first = config.build_policy().unwrap();
    assert!(first.next().is_ok());
    assert!(first.next().is_err());

    let mut second = config.build_policy().unwrap();
    assert_eq!(second.next(), Ok(Duration::from_millis(100)));
}

//! Reconnection policies deciding how long to wait before each attempt.

use crate::error::{ConfigError, PolicyExhausted};
use std::time::Duration;

/// Reconnection policy consulted once per reconnection attempt.
///
/// Policies are stateful: every successful [`next`](Self::next) consumes one
/// attempt, and an exhausted policy stays exhausted until [`reset`](Self::reset)
/// is called explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Walk a fixed list of waits once, in order.
    Interval(IntervalPolicy),

    /// Wait the same duration every time, optionally up to a budget.
    Raw(RawPolicy),
}

impl ReconnectPolicy {
    /// Creates an interval policy from an ordered list of waits.
    pub fn interval(intervals: Vec<Duration>) -> Result<Self, ConfigError> {
        IntervalPolicy::new(intervals).map(ReconnectPolicy::Interval)
    }

    /// Creates a raw policy waiting `delay` before each of at most `max_attempts` attempts.
    pub fn raw(delay: Duration, max_attempts: Option<u32>) -> Result<Self, ConfigError> {
        RawPolicy::new(delay, max_attempts).map(ReconnectPolicy::Raw)
    }

    /// Returns the wait before the next attempt, consuming that attempt.
    pub fn next(&mut self) -> Result<Duration, PolicyExhausted> {
        match self {
            ReconnectPolicy::Interval(policy) => policy.next(),
            ReconnectPolicy::Raw(policy) => policy.next(),
        }
    }

    /// Number of attempts handed out so far.
    pub fn attempts(&self) -> u32 {
        match self {
            ReconnectPolicy::Interval(policy) => policy.attempts(),
            ReconnectPolicy::Raw(policy) => policy.attempts(),
        }
    }

    /// Returns true if the next call to [`next`](Self::next) will fail.
    pub fn is_exhausted(&self) -> bool {
        match self {
            ReconnectPolicy::Interval(policy) => policy.remaining() == 0,
            ReconnectPolicy::Raw(policy) => policy.remaining() == Some(0),
        }
    }

    /// Restores the full attempt budget.
    pub fn reset(&mut self) {
        match self {
            ReconnectPolicy::Interval(policy) => policy.reset(),
            ReconnectPolicy::Raw(policy) => policy.reset(),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconnectPolicy::Interval(_) => "interval",
            ReconnectPolicy::Raw(_) => "raw",
        }
    }
}

/// Hands out each configured interval exactly once, in configured order.
///
/// The cursor never wraps and is not rewound when a reconnect succeeds, so
/// the list is a budget for the lifetime of the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalPolicy {
    intervals: Vec<Duration>,
    cursor: usize,
}

impl IntervalPolicy {
    /// Creates a policy from a non-empty list of positive waits.
    pub fn new(intervals: Vec<Duration>) -> Result<Self, ConfigError> {
        if intervals.is_empty() {
            return Err(ConfigError::EmptyIntervals);
        }
        if let Some(index) = intervals.iter().position(Duration::is_zero) {
            return Err(ConfigError::NonPositiveInterval { index });
        }
        Ok(Self {
            intervals,
            cursor: 0,
        })
    }

    /// Returns the interval under the cursor and advances it.
    pub fn next(&mut self) -> Result<Duration, PolicyExhausted> {
        match self.intervals.get(self.cursor) {
            Some(&interval) => {
                self.cursor += 1;
                Ok(interval)
            }
            None => Err(PolicyExhausted {
                attempts: self.attempts(),
            }),
        }
    }

    /// Number of intervals handed out so far.
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.cursor).unwrap_or(u32::MAX)
    }

    /// Number of intervals not yet handed out.
    pub fn remaining(&self) -> usize {
        self.intervals.len() - self.cursor
    }

    /// The configured intervals.
    pub fn intervals(&self) -> &[Duration] {
        &self.intervals
    }

    /// Rewinds the cursor to the first interval.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Waits a fixed delay before every attempt.
///
/// With a budget of `N` attempts exactly `N` calls to [`next`](Self::next)
/// succeed. Without a budget it never exhausts.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPolicy {
    delay: Duration,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl RawPolicy {
    /// Creates a policy waiting `delay` (must be positive) before each attempt.
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Result<Self, ConfigError> {
        if delay.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "reconnect_interval",
            });
        }
        Ok(Self {
            delay,
            max_attempts,
            attempts: 0,
        })
    }

    /// Returns the fixed delay unless the attempt budget is spent.
    pub fn next(&mut self) -> Result<Duration, PolicyExhausted> {
        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                return Err(PolicyExhausted {
                    attempts: self.attempts,
                });
            }
        }
        self.attempts = self.attempts.saturating_add(1);
        Ok(self.delay)
    }

    /// Number of attempts handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Remaining budget, or `None` when unbounded.
    pub fn remaining(&self) -> Option<u32> {
        self.max_attempts.map(|max| max - self.attempts)
    }

    /// The fixed delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The attempt budget, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Restores the full attempt budget.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

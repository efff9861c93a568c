use crate::error::ConfigError;
use crate::policy::ReconnectPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Keep-alive period used when the configuration does not name one.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Which reconnection policy a [`ReconnectConfig`] activates.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectStrategy {
    /// Walk `intervals` once, in order.
    Interval {
        /// Waits before each attempt.
        intervals: Vec<Duration>,
    },

    /// Wait a fixed delay before every attempt.
    Raw {
        /// Explicit wait; the keep-alive interval is used when absent.
        reconnect_interval: Option<Duration>,
        /// Attempt budget; `None` retries forever.
        max_attempts: Option<u32>,
    },
}

/// Automatic reconnection settings for a hub connection.
///
/// Usually deserialized from the structured option
/// `{"type": "interval", "intervals": [...], "keep_alive_interval": k}` or
/// `{"type": "raw", "keep_alive_interval": k, "max_attempts": m}`, with
/// durations in (possibly fractional) seconds. A missing `type` means `raw`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ReconnectOptions")]
pub struct ReconnectConfig {
    strategy: ReconnectStrategy,
    keep_alive_interval: Option<Duration>,
}

impl ReconnectConfig {
    /// Interval reconnection over `intervals`.
    pub fn interval(intervals: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            strategy: ReconnectStrategy::Interval {
                intervals: intervals.into_iter().collect(),
            },
            keep_alive_interval: None,
        }
    }

    /// Raw reconnection with an optional attempt budget.
    ///
    /// The wait defaults to the keep-alive interval; see
    /// [`reconnect_interval`](Self::reconnect_interval).
    pub fn raw(max_attempts: Option<u32>) -> Self {
        Self {
            strategy: ReconnectStrategy::Raw {
                reconnect_interval: None,
                max_attempts,
            },
            keep_alive_interval: None,
        }
    }

    /// Parses the structured option from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: ReconnectOptions =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        options.try_into()
    }

    /// Parses the structured option from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let options: ReconnectOptions =
            serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        options.try_into()
    }

    /// Sets the keep-alive ping period.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Sets the fixed wait of a raw policy. Has no effect on interval policies.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        if let ReconnectStrategy::Raw {
            reconnect_interval, ..
        } = &mut self.strategy
        {
            *reconnect_interval = Some(interval);
        }
        self
    }

    /// The configured strategy.
    pub fn strategy(&self) -> &ReconnectStrategy {
        &self.strategy
    }

    /// The keep-alive period, if configured.
    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive_interval
    }

    /// The keep-alive period, or [`DEFAULT_KEEP_ALIVE_INTERVAL`].
    pub fn effective_keep_alive(&self) -> Duration {
        self.keep_alive_interval.unwrap_or(DEFAULT_KEEP_ALIVE_INTERVAL)
    }

    /// Builds a fresh policy instance with a full attempt budget.
    pub fn build_policy(&self) -> Result<ReconnectPolicy, ConfigError> {
        if self.keep_alive_interval.is_some_and(|k| k.is_zero()) {
            return Err(ConfigError::NonPositiveDuration {
                field: "keep_alive_interval",
            });
        }

        match &self.strategy {
            ReconnectStrategy::Interval { intervals } => {
                ReconnectPolicy::interval(intervals.clone())
            }
            ReconnectStrategy::Raw {
                reconnect_interval,
                max_attempts,
            } => ReconnectPolicy::raw(
                reconnect_interval.unwrap_or_else(|| self.effective_keep_alive()),
                *max_attempts,
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReconnectKind {
    Interval,
    #[default]
    Raw,
}

/// Wire shape of the structured reconnect option.
#[derive(Debug, Deserialize)]
struct ReconnectOptions {
    #[serde(rename = "type", default)]
    kind: ReconnectKind,
    #[serde(default)]
    intervals: Vec<f64>,
    keep_alive_interval: Option<f64>,
    reconnect_interval: Option<f64>,
    max_attempts: Option<u32>,
}

impl TryFrom<ReconnectOptions> for ReconnectConfig {
    type Error = ConfigError;

    fn try_from(options: ReconnectOptions) -> Result<Self, Self::Error> {
        let keep_alive_interval = options
            .keep_alive_interval
            .map(|secs| seconds("keep_alive_interval", secs))
            .transpose()?;

        let strategy = match options.kind {
            ReconnectKind::Interval => {
                let intervals = options
                    .intervals
                    .iter()
                    .enumerate()
                    .map(|(index, &secs)| {
                        seconds("intervals", secs)
                            .map_err(|_| ConfigError::NonPositiveInterval { index })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ReconnectStrategy::Interval { intervals }
            }
            ReconnectKind::Raw => ReconnectStrategy::Raw {
                reconnect_interval: options
                    .reconnect_interval
                    .map(|secs| seconds("reconnect_interval", secs))
                    .transpose()?,
                max_attempts: options.max_attempts,
            },
        };

        let config = ReconnectConfig {
            strategy,
            keep_alive_interval,
        };
        config.build_policy()?;
        Ok(config)
    }
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(ConfigError::NonPositiveDuration { field });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::NonPositiveDuration { field })
}

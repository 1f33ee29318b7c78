use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

/// Geometric growth of the poll interval, capped at `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub multiplier: f64,
    pub max_interval: Duration,
}

/// How often and how many times the job status is read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub backoff: Option<Backoff>,
}

impl PollingPolicy {
    pub const fn fixed(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts,
            backoff: None,
        }
    }

    /// Pause after the `attempt`-th read (1-based) before the next one.
    pub fn interval_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            None => self.poll_interval,
            Some(Backoff {
                multiplier,
                max_interval,
            }) => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.poll_interval.as_secs_f64() * multiplier.powi(exponent);
                if !secs.is_finite() || secs >= max_interval.as_secs_f64() {
                    max_interval
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    /// Upper bound of the time spent sleeping between reads.
    pub fn max_wait(&self) -> Duration {
        (1..self.max_attempts)
            .map(|a| self.interval_after(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Optional per-run overrides applied on top of a strategy's polling policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PollingOverrides {
    #[serde(default)]
    pub(crate) poll_interval: Option<DurationString>,

    #[serde(default)]
    pub(crate) max_attempts: Option<u32>,

    #[serde(default)]
    pub(crate) backoff_multiplier: Option<f64>,

    #[serde(default)]
    pub(crate) max_interval: Option<DurationString>,
}

const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

impl PollingOverrides {
    pub(crate) fn apply(&self, base: PollingPolicy) -> PollingPolicy {
        let poll_interval = self
            .poll_interval
            .clone()
            .map(Duration::from)
            .unwrap_or(base.poll_interval);
        let max_attempts = self.max_attempts.unwrap_or(base.max_attempts);
        let backoff = match self.backoff_multiplier {
            Some(multiplier) => Some(Backoff {
                multiplier,
                max_interval: self
                    .max_interval
                    .clone()
                    .map(Duration::from)
                    .unwrap_or(DEFAULT_MAX_INTERVAL),
            }),
            None => base.backoff,
        };

        PollingPolicy {
            poll_interval,
            max_attempts,
            backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug)]
    struct A {
        #[serde(default)]
        polling: PollingOverrides,
    }

    const BASE: PollingPolicy = PollingPolicy::fixed(Duration::from_secs(5), 20);

    #[test]
    fn test_overrides_deserialize_partial() {
        let yaml_data = r#"
          polling:
            poll_interval: 15s
        "#;

        let a: A = serde_yaml::from_str(yaml_data).unwrap();

        assert_eq!(
            a.polling.apply(BASE),
            PollingPolicy::fixed(Duration::from_secs(15), 20)
        );
    }

    #[test]
    fn test_overrides_deserialize_omitted() {
        let a: A = serde_yaml::from_str("{}").unwrap();

        assert_eq!(a.polling.apply(BASE), BASE);
    }

    #[test]
    fn test_overrides_enable_backoff() {
        let yaml_data = r#"
          polling:
            max_attempts: 4
            backoff_multiplier: 2.0
            max_interval: 12s
        "#;

        let policy = serde_yaml::from_str::<A>(yaml_data).unwrap().polling.apply(BASE);

        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.interval_after(1), Duration::from_secs(5));
        assert_eq!(policy.interval_after(2), Duration::from_secs(10));
        assert_eq!(policy.interval_after(3), Duration::from_secs(12));
        assert_eq!(policy.max_wait(), Duration::from_secs(27));
    }

    #[test]
    fn test_max_wait_saturates() {
        let policy = PollingPolicy::fixed(Duration::MAX, 3);

        assert_eq!(policy.max_wait(), Duration::MAX);
    }

    #[test]
    fn test_single_attempt_never_waits() {
        assert_eq!(PollingPolicy::fixed(Duration::MAX, 1).max_wait(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_interval_is_constant() {
        assert_eq!(BASE.interval_after(1), BASE.interval_after(19));
        assert_eq!(BASE.max_wait(), Duration::from_secs(95));
    }
}

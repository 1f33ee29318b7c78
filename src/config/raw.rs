use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;
use thiserror::Error;

use super::Config;
use super::polling::PollingOverrides;
use crate::kubernetes_objects::DEFAULT_NAMESPACE;

pub(super) const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    /// Namespace the job is submitted to
    #[serde(default)]
    pub(super) namespace: Option<String>,

    /// Connect/read/write timeout of the cluster client
    #[serde(default)]
    pub(super) client_timeout: Option<DurationString>,

    #[serde(default)]
    pub(super) polling: PollingOverrides,
}

#[derive(Error, Debug)]
pub enum ConfigParseError {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("polling.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("polling.backoff_multiplier must be a finite number >= 1.0, got {0}")]
    InvalidBackoffMultiplier(f64),

    #[error("client_timeout must be greater than zero")]
    ZeroClientTimeout,

    #[error("polling.{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigParseError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let namespace = raw
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if namespace.trim().is_empty() {
            return Err(ConfigParseError::EmptyNamespace);
        }

        if raw.polling.max_attempts == Some(0) {
            return Err(ConfigParseError::ZeroAttempts);
        }
        let intervals = [
            ("poll_interval", &raw.polling.poll_interval),
            ("max_interval", &raw.polling.max_interval),
        ];
        for (key, interval) in intervals {
            if interval.clone().map(Duration::from).is_some_and(|d| d.is_zero()) {
                return Err(ConfigParseError::ZeroInterval(key));
            }
        }
        if let Some(multiplier) = raw.polling.backoff_multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(ConfigParseError::InvalidBackoffMultiplier(multiplier));
            }
        }

        let client_timeout = raw
            .client_timeout
            .map(Duration::from)
            .unwrap_or(DEFAULT_CLIENT_TIMEOUT);
        if client_timeout.is_zero() {
            return Err(ConfigParseError::ZeroClientTimeout);
        }

        Ok(Config {
            namespace,
            client_timeout,
            polling: raw.polling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes_objects::strategy::MetricsStrategy;

    fn parse(yaml: &str) -> Result<Config, ConfigParseError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        Config::try_from(raw)
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse("{}").unwrap();

        assert_eq!(config.namespace, "default");
        assert_eq!(config.client_timeout, Duration::from_secs(30));
        assert_eq!(
            config.polling_for(MetricsStrategy::FileBased),
            MetricsStrategy::FileBased.polling()
        );
    }

    #[test]
    fn test_full_document() {
        let config = parse(
            r#"
            namespace: batch
            client_timeout: 1m
            polling:
              poll_interval: 2s
              max_attempts: 3
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace, "batch");
        assert_eq!(config.client_timeout, Duration::from_secs(60));
        let polling = config.polling_for(MetricsStrategy::Sidecar);
        assert_eq!(polling.poll_interval, Duration::from_secs(2));
        assert_eq!(polling.max_attempts, 3);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            parse("namespace: ''"),
            Err(ConfigParseError::EmptyNamespace)
        ));
        assert!(matches!(
            parse("polling: { max_attempts: 0 }"),
            Err(ConfigParseError::ZeroAttempts)
        ));
        assert!(matches!(
            parse("polling: { backoff_multiplier: 0.5 }"),
            Err(ConfigParseError::InvalidBackoffMultiplier(_))
        ));
        assert!(matches!(
            parse("client_timeout: 0s"),
            Err(ConfigParseError::ZeroClientTimeout)
        ));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        assert!(matches!(
            parse("polling: { poll_interval: 0s }"),
            Err(ConfigParseError::ZeroInterval("poll_interval"))
        ));
        assert!(matches!(
            parse("polling: { backoff_multiplier: 2.0, max_interval: 0ms }"),
            Err(ConfigParseError::ZeroInterval("max_interval"))
        ));
    }

    #[test]
    fn test_huge_interval_does_not_overflow_max_wait() {
        let config = parse("polling: { poll_interval: 300000000000y, max_attempts: 3 }").unwrap();

        let polling = config.polling_for(MetricsStrategy::Sidecar);

        assert!(polling.max_wait() >= polling.poll_interval);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(serde_yaml::from_str::<RawConfig>("mcservers: {}").is_err());
    }
}

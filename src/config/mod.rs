pub mod polling;
mod raw;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use self::polling::{PollingOverrides, PollingPolicy};
use self::raw::{DEFAULT_CLIENT_TIMEOUT, RawConfig};
pub use self::raw::ConfigParseError;
use crate::kubernetes_objects::DEFAULT_NAMESPACE;
use crate::kubernetes_objects::strategy::MetricsStrategy;

#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    pub client_timeout: Duration,
    pub(crate) polling: PollingOverrides,
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(#[from] ConfigParseError),
}

impl Config {
    #[instrument("load_config", level = "trace")]
    pub async fn new_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigLoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&text).map_err(|e| match e {
            ConfigLoadError::Parse { source, .. } => ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigLoadError> {
        let raw: RawConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigLoadError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Config::try_from(raw)?)
    }

    /// Polling policy of `strategy` with this config's overrides applied.
    pub fn polling_for(&self, strategy: MetricsStrategy) -> PollingPolicy {
        self.polling.apply(strategy.polling())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            namespace: DEFAULT_NAMESPACE.to_string(),
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            polling: PollingOverrides::default(),
        }
    }
}

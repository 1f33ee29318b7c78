use std::sync::Arc;

use self::cli::Cli;
use self::cluster::KubeClusterClient;
use self::config::Config;
use self::kubernetes_objects::definition::{ConstructionError, JobDefinition};
use self::kubernetes_objects::naming::unique_suffix;
use self::routine::metrics_job::MetricsJobContext;
use self::routine::metrics_job::error::MetricsJobError;
use self::shutdown::Shutdown;
use self::telemetry::{JobObserver, TracingObserver};
use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_error::ExtractSpanTrace;
use tracing_error::SpanTrace;

pub(crate) mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod kubernetes_objects;
pub mod routine;
pub mod shutdown;
pub mod telemetry;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load config.\n{0}")]
    ConfigError(#[from] config::ConfigLoadError),

    #[error("Failed to infer kubernetes client config.\n{0}")]
    KubeConfigError(#[from] kube::config::InferConfigError),

    #[error("Failed to initialize kubernetes client.\n{0}")]
    KubeClientError(#[from] kube::Error),

    #[error("Failed to build job definition.\n{0}")]
    DefinitionError(#[from] ConstructionError),

    #[error("Failed to render job manifest.\n{0}")]
    RenderError(#[from] serde_json::Error),

    #[error("Metrics job routine stopped due to following error:\n{0}")]
    MetricsJobError(#[from] MetricsJobError),
}

impl ExtractSpanTrace for AppError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            AppError::MetricsJobError(e) => e.span_trace(),
            _ => None,
        }
    }
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::MetricsJobError(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// Runs the binary and returns the process exit code for a completed run.
pub async fn app() -> Result<u8, AppError> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::new_from_file(path).await?,
        None => Config::default(),
    };
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }

    if cli.dry_run {
        let definition = JobDefinition::build(cli.strategy, &config.namespace, &unique_suffix())?;
        println!("{}", serde_json::to_string_pretty(&definition.to_manifest())?);
        return Ok(0);
    }

    info!("Config Loaded.");

    let observer: Arc<dyn JobObserver> = Arc::new(TracingObserver);
    observer.set_attribute("application", env!("CARGO_PKG_NAME").into());
    observer.set_attribute("version", env!("CARGO_PKG_VERSION").into());

    let client = new_kube_client(&config).await?;

    info!("Kubernetes Client Initialized.");

    let context = MetricsJobContext::new(
        config,
        cli.strategy,
        Arc::new(KubeClusterClient::new(client)),
        observer,
    );
    let mut shutdown = Shutdown::new();
    let report = context.run(&mut shutdown).await?;

    Ok(report.exit_code())
}

async fn new_kube_client(config: &Config) -> Result<kube::Client, AppError> {
    let mut kube_config = kube::Config::infer().await?;
    kube_config.connect_timeout = Some(config.client_timeout);
    kube_config.read_timeout = Some(config.client_timeout);
    kube_config.write_timeout = Some(config.client_timeout);
    Ok(kube::Client::try_from(kube_config)?)
}

use clap::Parser;
use std::path::PathBuf;

use crate::kubernetes_objects::strategy::MetricsStrategy;

/// Submits a metrics workload as a Kubernetes Job and waits for it to finish.
#[derive(Debug, Parser)]
#[clap(version, about)]
pub(crate) struct Cli {
    /// How the workload's metrics are collected
    #[clap(short, long, value_enum, default_value_t = MetricsStrategy::Sidecar)]
    pub(crate) strategy: MetricsStrategy,

    /// Optional YAML config file
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Namespace override, takes precedence over the config file
    #[clap(short, long)]
    pub(crate) namespace: Option<String>,

    /// Print the job manifest as JSON instead of submitting it
    #[clap(long)]
    pub(crate) dry_run: bool,
}

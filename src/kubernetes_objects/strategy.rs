use std::fmt::Display;
use std::time::Duration;

use clap::ValueEnum;

use super::definition::{
    ContainerSpec, ResourceQuantities, Resources, VolumeMountSpec, VolumeSource, VolumeSpec,
};
use crate::config::polling::PollingPolicy;

/// How the workload's metrics leave the pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum MetricsStrategy {
    /// OpenTelemetry collector sidecar sharing the workload's process namespace
    Sidecar,

    /// Single container writing metrics to a file on an emptyDir volume
    FileBased,

    /// Single container printing a fixed set of metric lines to stdout
    #[value(name = "database")]
    DatabaseMetrics,
}

const BUSYBOX_IMAGE: &str = "busybox:latest";
const OTEL_COLLECTOR_IMAGE: &str = "otel/opentelemetry-collector-contrib:0.80.0";

pub(crate) const OTEL_CONFIG_VOLUME: &str = "otel-config";
pub(crate) const OTEL_CONFIG_MAP: &str = "otel-sidecar-config";
pub(crate) const METRICS_VOLUME: &str = "metrics-volume";
pub const METRICS_FILE_PATH: &str = "/tmp/metrics.prom";

const SIDECAR_WORKLOAD_ITERATIONS: u32 = 35;

const FILE_METRICS_SCRIPT: &str = "echo 'Starting Busybox metrics workload'; \
    : > /tmp/metrics.prom; \
    counter=0; \
    while [ $counter -lt 5 ]; do \
      echo '=== METRICS ==='; \
      echo \"workload_progress $counter\" | tee -a /tmp/metrics.prom; \
      echo \"items_processed_total $((counter * 10))\" | tee -a /tmp/metrics.prom; \
      echo \"errors_encountered_total $((counter / 2))\" | tee -a /tmp/metrics.prom; \
      sleep 2; \
      counter=$((counter + 1)); \
    done; \
    echo '=== FINAL METRICS ==='; \
    echo \"workload_progress $counter\" | tee -a /tmp/metrics.prom; \
    echo 'workload_duration_seconds 10' | tee -a /tmp/metrics.prom; \
    echo 'workload_status 1' | tee -a /tmp/metrics.prom; \
    echo 'Workload completed'; \
    exit 0";

const DATABASE_METRICS_SCRIPT: &str = "echo 'Starting database metrics'; \
    echo 'db_queries_total 10'; \
    echo 'db_connections_active 5'; \
    echo 'db_response_time_seconds 0.25'; \
    echo 'Database metrics done'; \
    exit 0";

impl MetricsStrategy {
    pub const ALL: [MetricsStrategy; 3] = [
        MetricsStrategy::Sidecar,
        MetricsStrategy::FileBased,
        MetricsStrategy::DatabaseMetrics,
    ];

    /// Value of the `metrics-type` label.
    pub fn marker(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => "sidecar",
            MetricsStrategy::FileBased => "file-based",
            MetricsStrategy::DatabaseMetrics => "database",
        }
    }

    /// Job name prefix; the unique suffix is appended at build time.
    pub fn base_name(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => "busybox-monitored-job",
            MetricsStrategy::FileBased => "busybox-file-metrics",
            MetricsStrategy::DatabaseMetrics => "database-metrics",
        }
    }

    pub fn job_app_label(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => "busybox-monitored",
            MetricsStrategy::FileBased => "busybox-file-metrics",
            MetricsStrategy::DatabaseMetrics => "database-metrics",
        }
    }

    pub fn pod_app_label(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => "busybox-with-metrics",
            MetricsStrategy::FileBased => "busybox-file-metrics",
            MetricsStrategy::DatabaseMetrics => "database-metrics",
        }
    }

    /// Times the cluster may recreate the job's pod after a failure.
    ///
    /// The sidecar strategy tolerates one collector startup race.
    pub fn backoff_limit(self) -> i32 {
        match self {
            MetricsStrategy::Sidecar => 1,
            MetricsStrategy::FileBased | MetricsStrategy::DatabaseMetrics => 0,
        }
    }

    pub fn shares_process_namespace(self) -> bool {
        matches!(self, MetricsStrategy::Sidecar)
    }

    pub fn polling(self) -> PollingPolicy {
        match self {
            MetricsStrategy::Sidecar => PollingPolicy::fixed(Duration::from_secs(5), 15),
            MetricsStrategy::FileBased => PollingPolicy::fixed(Duration::from_secs(5), 20),
            MetricsStrategy::DatabaseMetrics => PollingPolicy::fixed(Duration::from_secs(3), 10),
        }
    }

    pub fn main_container_name(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => "busybox-main",
            MetricsStrategy::FileBased => "busybox-file-metrics",
            MetricsStrategy::DatabaseMetrics => "database-metrics-generator",
        }
    }

    /// Where the operator should look for the collected metrics after success.
    pub fn success_hint(self) -> &'static str {
        match self {
            MetricsStrategy::Sidecar => {
                "Check sidecar logs for collected metrics: kubectl logs <pod-name> -c otel-sidecar"
            }
            MetricsStrategy::FileBased => {
                "Metrics were written to /tmp/metrics.prom; check agent logs for scraped metrics"
            }
            MetricsStrategy::DatabaseMetrics => {
                "Metric lines were printed to the container's standard output"
            }
        }
    }

    /// Containers in pod order. The main workload always comes first.
    pub(crate) fn containers(self) -> Vec<ContainerSpec> {
        match self {
            MetricsStrategy::Sidecar => vec![
                ContainerSpec {
                    name: self.main_container_name().to_string(),
                    image: BUSYBOX_IMAGE.to_string(),
                    command: shell(),
                    args: vec![sidecar_workload_script(SIDECAR_WORKLOAD_ITERATIONS)],
                    resources: Some(Resources {
                        requests: ResourceQuantities::new("100m", "64Mi"),
                        limits: ResourceQuantities::new("200m", "128Mi"),
                    }),
                    volume_mounts: Vec::new(),
                },
                ContainerSpec {
                    name: "otel-sidecar".to_string(),
                    image: OTEL_COLLECTOR_IMAGE.to_string(),
                    command: vec!["/otelcol-contrib".to_string()],
                    args: vec!["--config=/etc/otel-config.yaml".to_string()],
                    resources: Some(Resources {
                        requests: ResourceQuantities::new("100m", "128Mi"),
                        limits: ResourceQuantities::new("200m", "256Mi"),
                    }),
                    volume_mounts: vec![VolumeMountSpec {
                        name: OTEL_CONFIG_VOLUME.to_string(),
                        mount_path: "/etc/otel-config.yaml".to_string(),
                        sub_path: Some("otel-config.yaml".to_string()),
                    }],
                },
            ],
            MetricsStrategy::FileBased => vec![ContainerSpec {
                name: self.main_container_name().to_string(),
                image: BUSYBOX_IMAGE.to_string(),
                command: shell(),
                args: vec![FILE_METRICS_SCRIPT.to_string()],
                resources: None,
                // /tmp/metrics.prom must live on the emptyDir
                volume_mounts: vec![VolumeMountSpec {
                    name: METRICS_VOLUME.to_string(),
                    mount_path: "/tmp".to_string(),
                    sub_path: None,
                }],
            }],
            MetricsStrategy::DatabaseMetrics => vec![ContainerSpec {
                name: self.main_container_name().to_string(),
                image: BUSYBOX_IMAGE.to_string(),
                command: shell(),
                args: vec![DATABASE_METRICS_SCRIPT.to_string()],
                resources: Some(Resources {
                    requests: ResourceQuantities::new("100m", "64Mi"),
                    limits: ResourceQuantities::new("200m", "128Mi"),
                }),
                volume_mounts: Vec::new(),
            }],
        }
    }

    pub(crate) fn volumes(self) -> Vec<VolumeSpec> {
        match self {
            MetricsStrategy::Sidecar => vec![VolumeSpec {
                name: OTEL_CONFIG_VOLUME.to_string(),
                source: VolumeSource::ConfigMap {
                    name: OTEL_CONFIG_MAP.to_string(),
                    default_mode: 0o644,
                },
            }],
            MetricsStrategy::FileBased => vec![VolumeSpec {
                name: METRICS_VOLUME.to_string(),
                source: VolumeSource::EmptyDir,
            }],
            MetricsStrategy::DatabaseMetrics => Vec::new(),
        }
    }
}

impl Display for MetricsStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.marker())
    }
}

fn shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

fn sidecar_workload_script(iterations: u32) -> String {
    format!(
        "echo 'Starting Busybox workload'; \
         echo 'Monitoring with OpenTelemetry'; \
         counter=0; \
         while [ $counter -lt {iterations} ]; do \
           echo 'Processing iteration: ' $counter; \
           sleep 5; \
           counter=$((counter + 1)); \
         done; \
         echo 'Workload completed successfully'"
    )
}

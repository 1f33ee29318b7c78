//! Immutable, strategy-specific job definitions and their rendering into a
//! `batch/v1` Job manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, PodSpec, PodTemplateSpec,
    ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use thiserror::Error;
use tracing::{debug, instrument};

use super::strategy::MetricsStrategy;

pub const TTL_AFTER_FINISHED: Duration = Duration::from_secs(300);
pub(crate) const CREATED_BY: &str = "metrics-job-runner";
const MAX_NAME_LENGTH: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuantities {
    pub cpu: String,
    pub memory: String,
}

impl ResourceQuantities {
    pub fn new(cpu: &str, memory: &str) -> Self {
        Self {
            cpu: cpu.to_string(),
            memory: memory.to_string(),
        }
    }

    fn to_map(&self) -> BTreeMap<String, Quantity> {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(self.cpu.clone())),
            ("memory".to_string(), Quantity(self.memory.clone())),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub requests: ResourceQuantities,
    pub limits: ResourceQuantities,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMountSpec {
    pub name: String,
    pub mount_path: String,
    pub sub_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    /// Shell script for `sh -c`; never inspected here.
    pub args: Vec<String>,
    pub resources: Option<Resources>,
    pub volume_mounts: Vec<VolumeMountSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    ConfigMap { name: String, default_mode: i32 },
    EmptyDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
}

impl RestartPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::Never => "Never",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Job name '{0}' is not a valid DNS-1123 label of at most 63 characters")]
    InvalidName(String),

    #[error("Job definition has no containers")]
    NoContainers,

    #[error("Container name '{0}' is declared more than once")]
    DuplicateContainer(String),

    #[error("Volume name '{0}' is declared more than once")]
    DuplicateVolume(String),

    #[error("Container '{container}' mounts undeclared volume '{volume}'")]
    UnknownVolume { container: String, volume: String },
}

/// A fully-populated job, built once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    strategy: MetricsStrategy,
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    pod_labels: BTreeMap<String, String>,
    containers: Vec<ContainerSpec>,
    volumes: Vec<VolumeSpec>,
    restart_policy: RestartPolicy,
    backoff_limit: i32,
    ttl_after_finished: Duration,
    shares_process_namespace: bool,
}

impl JobDefinition {
    /// Builds the definition for `strategy`, naming it `<base name>-<suffix>`.
    #[instrument(
        "build_definition",
        skip_all,
        fields(strategy = %strategy, kubernetes_namespace = %namespace, suffix = %suffix)
    )]
    pub fn build(
        strategy: MetricsStrategy,
        namespace: &str,
        suffix: &str,
    ) -> Result<Self, ConstructionError> {
        let labels = BTreeMap::from([
            ("app".to_string(), strategy.job_app_label().to_string()),
            ("metrics-type".to_string(), strategy.marker().to_string()),
            ("created-by".to_string(), CREATED_BY.to_string()),
        ]);
        let pod_labels =
            BTreeMap::from([("app".to_string(), strategy.pod_app_label().to_string())]);

        let definition = JobDefinition {
            strategy,
            name: format!("{}-{}", strategy.base_name(), suffix),
            namespace: namespace.to_string(),
            labels,
            pod_labels,
            containers: strategy.containers(),
            volumes: strategy.volumes(),
            restart_policy: RestartPolicy::Never,
            backoff_limit: strategy.backoff_limit(),
            ttl_after_finished: TTL_AFTER_FINISHED,
            shares_process_namespace: strategy.shares_process_namespace(),
        };
        definition.validate()?;

        debug!(
            "Built job definition '{}' with {} container(s) and {} volume(s).",
            definition.name,
            definition.containers.len(),
            definition.volumes.len()
        );
        Ok(definition)
    }

    fn validate(&self) -> Result<(), ConstructionError> {
        if !is_dns1123_label(&self.name) {
            return Err(ConstructionError::InvalidName(self.name.clone()));
        }
        if self.containers.is_empty() {
            return Err(ConstructionError::NoContainers);
        }

        let mut container_names = BTreeSet::new();
        for container in &self.containers {
            if !container_names.insert(container.name.as_str()) {
                return Err(ConstructionError::DuplicateContainer(
                    container.name.clone(),
                ));
            }
        }

        let mut volume_names = BTreeSet::new();
        for volume in &self.volumes {
            if !volume_names.insert(volume.name.as_str()) {
                return Err(ConstructionError::DuplicateVolume(volume.name.clone()));
            }
        }

        for container in &self.containers {
            for mount in &container.volume_mounts {
                if !volume_names.contains(mount.name.as_str()) {
                    return Err(ConstructionError::UnknownVolume {
                        container: container.name.clone(),
                        volume: mount.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn strategy(&self) -> MetricsStrategy {
        self.strategy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn pod_labels(&self) -> &BTreeMap<String, String> {
        &self.pod_labels
    }

    pub fn containers(&self) -> &[ContainerSpec] {
        &self.containers
    }

    pub fn main_container(&self) -> &ContainerSpec {
        // validate() guarantees at least one container
        &self.containers[0]
    }

    pub fn volumes(&self) -> &[VolumeSpec] {
        &self.volumes
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    pub fn backoff_limit(&self) -> i32 {
        self.backoff_limit
    }

    pub fn ttl_after_finished(&self) -> Duration {
        self.ttl_after_finished
    }

    pub fn shares_process_namespace(&self) -> bool {
        self.shares_process_namespace
    }

    /// Renders the definition as the `batch/v1` Job submitted to the cluster.
    pub fn to_manifest(&self) -> Job {
        let containers = self.containers.iter().map(container_manifest).collect();
        let volumes = if self.volumes.is_empty() {
            None
        } else {
            Some(self.volumes.iter().map(volume_manifest).collect())
        };

        Job {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(self.labels.clone()),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(self.backoff_limit),
                ttl_seconds_after_finished: Some(self.ttl_after_finished.as_secs() as i32),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.pod_labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers,
                        volumes,
                        share_process_namespace: self.shares_process_namespace.then_some(true),
                        restart_policy: Some(self.restart_policy.as_str().to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }
}

fn container_manifest(spec: &ContainerSpec) -> Container {
    let volume_mounts = if spec.volume_mounts.is_empty() {
        None
    } else {
        Some(
            spec.volume_mounts
                .iter()
                .map(|m| VolumeMount {
                    name: m.name.clone(),
                    mount_path: m.mount_path.clone(),
                    sub_path: m.sub_path.clone(),
                    ..Default::default()
                })
                .collect(),
        )
    };

    Container {
        name: spec.name.clone(),
        image: Some(spec.image.clone()),
        command: Some(spec.command.clone()),
        args: Some(spec.args.clone()),
        resources: spec.resources.as_ref().map(|r| ResourceRequirements {
            requests: Some(r.requests.to_map()),
            limits: Some(r.limits.to_map()),
            ..Default::default()
        }),
        volume_mounts,
        ..Default::default()
    }
}

fn volume_manifest(spec: &VolumeSpec) -> Volume {
    match &spec.source {
        VolumeSource::ConfigMap { name, default_mode } => Volume {
            name: spec.name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: name.clone(),
                default_mode: Some(*default_mode),
                ..Default::default()
            }),
            ..Default::default()
        },
        VolumeSource::EmptyDir => Volume {
            name: spec.name.clone(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    }
}

fn is_dns1123_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LENGTH
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

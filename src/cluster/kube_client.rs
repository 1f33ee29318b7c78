use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::{Instrument, trace_span};

use super::{ClusterClient, ClusterError, JobCounters, JobIdentity};
use crate::kubernetes_objects::FIELD_MANAGER_NAME;
use crate::kubernetes_objects::definition::JobDefinition;

const BATCH_API_VERSION: &str = "batch/v1";

#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn probe(&self) -> Result<(), ClusterError> {
        self.client
            .list_api_group_resources(BATCH_API_VERSION)
            .instrument(trace_span!("list_api_group_resources", api_version = BATCH_API_VERSION))
            .await?;
        Ok(())
    }

    async fn create_job(
        &self,
        namespace: &str,
        definition: &JobDefinition,
    ) -> Result<JobIdentity, ClusterError> {
        let jobs_api: Api<Job> = Api::namespaced(self.client.clone(), namespace);

        let post_params = PostParams {
            field_manager: Some(FIELD_MANAGER_NAME.to_string()),
            ..Default::default()
        };

        let created = jobs_api
            .create(&post_params, &definition.to_manifest())
            .instrument(trace_span!(
                "create_job",
                kubernetes_namespace = %namespace,
                job_name = %definition.name()
            ))
            .await?;

        let name = created.metadata.name.ok_or_else(|| {
            ClusterError::MalformedResponse("created job has no metadata.name".to_string())
        })?;
        let uid = created.metadata.uid.ok_or_else(|| {
            ClusterError::MalformedResponse(format!("created job '{name}' has no metadata.uid"))
        })?;

        Ok(JobIdentity { name, uid })
    }

    async fn read_job(&self, name: &str, namespace: &str) -> Result<JobCounters, ClusterError> {
        let jobs_api: Api<Job> = Api::namespaced(self.client.clone(), namespace);

        let job = jobs_api
            .get(name)
            .instrument(trace_span!(
                "get_job",
                kubernetes_namespace = %namespace,
                job_name = %name
            ))
            .await?;

        let status = job.status.unwrap_or_default();
        Ok(JobCounters {
            succeeded: status.succeeded,
            failed: status.failed,
            active: status.active,
        })
    }
}

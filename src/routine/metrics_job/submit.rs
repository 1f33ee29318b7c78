use tracing::{error, info, instrument};

use super::error::MetricsJobError;
use crate::cluster::{ClusterClient, JobIdentity};
use crate::error::SpannedErr;
use crate::kubernetes_objects::definition::JobDefinition;
use crate::telemetry::JobObserver;

/// Submits `definition` exactly once. A rejection is final for this run.
#[instrument(
    "submit_job",
    skip_all,
    fields(
        kubernetes_namespace = %definition.namespace(),
        job_name = %definition.name()
    )
)]
pub(crate) async fn submit_job(
    client: &dyn ClusterClient,
    observer: &dyn JobObserver,
    definition: &JobDefinition,
) -> Result<JobIdentity, MetricsJobError> {
    observer.add_event("Creating Kubernetes Job");
    info!(
        "Creating {} metrics job '{}'...",
        definition.strategy(),
        definition.name()
    );

    match client.create_job(definition.namespace(), definition).await {
        Ok(identity) => {
            observer.add_event("Job created successfully");
            observer.set_attribute("job.uid", identity.uid.clone().into());
            observer.set_attribute("job.name", identity.name.clone().into());
            info!("Job created successfully: {}", identity.name);
            for container in definition.containers() {
                info!("Container '{}': {}", container.name, container.image);
            }
            Ok(identity)
        }
        Err(e) => {
            observer.record_error(&e);
            error!("Error creating job '{}': {}", definition.name(), e);
            Err(MetricsJobError::Submission(
                definition.name().to_string(),
                SpannedErr::new(e),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterError, MockClusterClient};
    use crate::kubernetes_objects::strategy::MetricsStrategy;
    use crate::telemetry::AttributeValue;
    use crate::telemetry::recording::RecordingObserver;

    fn definition() -> JobDefinition {
        JobDefinition::build(MetricsStrategy::DatabaseMetrics, "batch", "42").unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_cluster_identity() {
        let mut client = MockClusterClient::new();
        client
            .expect_create_job()
            .withf(|namespace, def| namespace == "batch" && def.name() == "database-metrics-42")
            .times(1)
            .returning(|_, def| {
                Ok(JobIdentity {
                    name: def.name().to_string(),
                    uid: "0b7c-uid".to_string(),
                })
            });
        let observer = RecordingObserver::default();

        let identity = submit_job(&client, &observer, &definition()).await.unwrap();

        assert_eq!(identity.uid, "0b7c-uid");
        assert_eq!(
            observer.attribute_values("job.uid"),
            vec![AttributeValue::Str("0b7c-uid".to_string())]
        );
        assert_eq!(
            observer.events(),
            vec!["Creating Kubernetes Job", "Job created successfully"]
        );
    }

    #[tokio::test]
    async fn test_rejection_carries_cluster_detail() {
        let mut client = MockClusterClient::new();
        client.expect_create_job().times(1).returning(|_, _| {
            Err(ClusterError::Rejected(
                "jobs.batch \"database-metrics-42\" already exists".to_string(),
            ))
        });
        let observer = RecordingObserver::default();

        let err = submit_job(&client, &observer, &definition())
            .await
            .unwrap_err();

        match err {
            MetricsJobError::Submission(name, e) => {
                assert_eq!(name, "database-metrics-42");
                assert!(e.to_string().contains("already exists"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(observer.errors().len(), 1);
    }
}

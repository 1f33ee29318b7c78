use tracing::{error, info, instrument};

use crate::cluster::{ClusterClient, ClusterError};
use crate::telemetry::JobObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(ClusterError),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Single best-effort call to the batch API discovery endpoint. Never retried.
#[instrument("probe_connectivity", skip_all)]
pub(crate) async fn probe_connectivity(
    client: &dyn ClusterClient,
    observer: &dyn JobObserver,
) -> Availability {
    info!("Testing connection to Kubernetes API...");
    match client.probe().await {
        Ok(()) => {
            observer.add_event("Kubernetes API connection successful");
            info!("Connected to Kubernetes API successfully.");
            Availability::Available
        }
        Err(e) => {
            observer.record_error(&e);
            error!("Cannot connect to Kubernetes API: {e}");
            Availability::Unavailable(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterClient;
    use crate::telemetry::recording::RecordingObserver;

    #[tokio::test]
    async fn test_probe_success() {
        let mut client = MockClusterClient::new();
        client.expect_probe().times(1).returning(|| Ok(()));
        let observer = RecordingObserver::default();

        let availability = probe_connectivity(&client, &observer).await;

        assert!(availability.is_available());
        assert_eq!(observer.events(), vec!["Kubernetes API connection successful"]);
    }

    #[tokio::test]
    async fn test_probe_failure_is_unavailable() {
        let mut client = MockClusterClient::new();
        client
            .expect_probe()
            .times(1)
            .returning(|| Err(ClusterError::Request("connection refused".to_string())));
        let observer = RecordingObserver::default();

        let availability = probe_connectivity(&client, &observer).await;

        assert_eq!(
            availability,
            Availability::Unavailable(ClusterError::Request("connection refused".to_string()))
        );
        assert_eq!(observer.errors().len(), 1);
    }
}

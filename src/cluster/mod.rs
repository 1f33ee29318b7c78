//! The cluster control plane as seen by the routine.
//!
//! [`ClusterClient`] is the only seam through which the routine reaches the
//! cluster; [`KubeClusterClient`] backs it with a real `kube::Client`.

mod kube_client;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::kubernetes_objects::definition::JobDefinition;

pub use self::kube_client::KubeClusterClient;

/// Cluster-assigned identity of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub name: String,
    pub uid: String,
}

/// Pod counters reported in a job's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub succeeded: Option<i32>,
    pub failed: Option<i32>,
    pub active: Option<i32>,
}

impl JobCounters {
    pub fn succeeded(&self) -> i32 {
        self.succeeded.unwrap_or(0)
    }

    pub fn failed(&self) -> i32 {
        self.failed.unwrap_or(0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The API server answered with an error status.
    #[error("Kubernetes API rejected the request: {0}")]
    Rejected(String),

    /// The request never got a usable answer (network, TLS, auth, timeout).
    #[error("Kubernetes API request failed: {0}")]
    Request(String),

    #[error("Kubernetes API returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(_) => ClusterError::Rejected(err.to_string()),
            _ => ClusterError::Request(err.to_string()),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists the batch API's resources to check the control plane is usable.
    async fn probe(&self) -> Result<(), ClusterError>;

    /// Creates the job and returns the identity the cluster assigned to it.
    async fn create_job(
        &self,
        namespace: &str,
        definition: &JobDefinition,
    ) -> Result<JobIdentity, ClusterError>;

    /// Reads the current status counters of a job.
    async fn read_job(&self, name: &str, namespace: &str) -> Result<JobCounters, ClusterError>;
}

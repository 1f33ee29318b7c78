use thiserror::Error;
use tracing_error::{ExtractSpanTrace, SpanTrace};

use crate::cluster::ClusterError;
use crate::error::SpannedErr;
use crate::kubernetes_objects::definition::ConstructionError;
use crate::shutdown::Shutdown;

#[derive(Error, Debug)]
pub enum MetricsJobError {
    #[error("Kubernetes is not available: {0}")]
    Connectivity(SpannedErr<ClusterError>),

    #[error("Failed to build job definition: {0}")]
    Construction(SpannedErr<ConstructionError>),

    #[error("Failed to create job '{0}': {1}")]
    Submission(String, SpannedErr<ClusterError>),

    #[error("{}", cancelled_message(.job_name, .reason, .polls))]
    Cancelled {
        /// `None` when the run stopped before a job was submitted.
        job_name: Option<String>,
        reason: &'static str,
        polls: u32,
        span_trace: SpanTrace,
    },
}

fn cancelled_message(job_name: &Option<String>, reason: &str, polls: &u32) -> String {
    match job_name {
        Some(job_name) => {
            format!("Monitoring of job '{job_name}' was cancelled by {reason} after {polls} poll(s)")
        }
        None => format!("Run was cancelled by {reason} before a job was submitted"),
    }
}

impl MetricsJobError {
    pub(crate) fn cancelled(job_name: Option<String>, polls: u32, shutdown: &Shutdown) -> Self {
        MetricsJobError::Cancelled {
            job_name,
            reason: shutdown.reason().unwrap_or("shutdown request"),
            polls,
            span_trace: SpanTrace::capture(),
        }
    }
}

impl ExtractSpanTrace for MetricsJobError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            MetricsJobError::Connectivity(e) => e.span_trace(),
            MetricsJobError::Construction(e) => e.span_trace(),
            MetricsJobError::Submission(_, e) => e.span_trace(),
            MetricsJobError::Cancelled { span_trace, .. } => Some(span_trace),
        }
    }
}

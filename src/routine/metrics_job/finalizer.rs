use tracing::{error, info, instrument, warn};

use super::MetricsJobContext;
use super::error::MetricsJobError;
use super::wait_until_job_finished::{JobOutcome, MonitorReport};
use crate::kubernetes_objects::strategy::{MetricsStrategy, OTEL_CONFIG_MAP};
use crate::telemetry::OutcomeStatus;

impl MetricsJobContext {
    /// Records the final status of the run and prints operator hints.
    #[instrument("finalizer", skip_all)]
    pub(super) fn finalizer(
        &self,
        result: Result<MonitorReport, MetricsJobError>,
    ) -> Result<MonitorReport, MetricsJobError> {
        let observer = self.observer.as_ref();

        match &result {
            Ok(report) => {
                let status = match report.outcome {
                    JobOutcome::Succeeded => OutcomeStatus::Ok,
                    _ => OutcomeStatus::Error,
                };
                observer.set_outcome(status, report.outcome.status_message());
                self.print_hints(report.outcome, &report.job.name, report.polls);
                info!(
                    "Metrics job '{}' {} after {} poll(s).",
                    report.job.name, report.outcome, report.polls
                );
            }
            Err(e) => {
                observer.record_error(e);
                match e {
                    MetricsJobError::Cancelled {
                        job_name: Some(job_name),
                        polls,
                        ..
                    } => {
                        observer.set_outcome(
                            OutcomeStatus::Error,
                            JobOutcome::Cancelled.status_message(),
                        );
                        self.print_hints(JobOutcome::Cancelled, job_name, *polls);
                    }
                    MetricsJobError::Connectivity(_) => {
                        observer.set_outcome(OutcomeStatus::Error, &e.to_string());
                        error!("Make sure the cluster is reachable with the current kubeconfig.");
                        if self.strategy == MetricsStrategy::Sidecar {
                            error!(
                                "The sidecar also needs its collector config: kubectl get configmap {OTEL_CONFIG_MAP}"
                            );
                        }
                    }
                    _ => observer.set_outcome(OutcomeStatus::Error, &e.to_string()),
                }
            }
        }

        result
    }

    fn print_hints(&self, outcome: JobOutcome, job_name: &str, polls: u32) {
        let namespace = &self.config.namespace;
        match outcome {
            JobOutcome::Succeeded => info!("{}", self.strategy.success_hint()),
            JobOutcome::Failed => error!(
                "Check logs with: kubectl logs -n {namespace} -l job-name={job_name} -c {}",
                self.strategy.main_container_name()
            ),
            JobOutcome::TimedOut => warn!(
                "Job '{job_name}' is still running after {polls} polls; inspect it with: kubectl get job -n {namespace} {job_name}"
            ),
            JobOutcome::Cancelled => warn!(
                "Job '{job_name}' was left running; remove it with: kubectl delete job -n {namespace} {job_name}"
            ),
        }
    }
}

use std::fmt::Display;

use tracing::{error, info, instrument, warn};

use crate::cluster::{ClusterClient, JobCounters, JobIdentity};
use crate::config::polling::PollingPolicy;
use crate::shutdown::Shutdown;
use crate::telemetry::JobObserver;

/// Terminal state reached by one monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed => "failed",
            JobOutcome::TimedOut => "timed out",
            JobOutcome::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub job: JobIdentity,
    pub outcome: JobOutcome,
    /// Status reads performed, failed reads included.
    pub polls: u32,
    pub last_counters: JobCounters,
}

/// Terminal classification of a single status read.
///
/// A failed pod wins over a succeeded one when both are reported at once.
pub(crate) fn classify(counters: &JobCounters) -> Option<JobOutcome> {
    match (counters.succeeded() > 0, counters.failed() > 0) {
        (_, true) => Some(JobOutcome::Failed),
        (true, false) => Some(JobOutcome::Succeeded),
        (false, false) => None,
    }
}

#[instrument(
    "wait_until_job_finished",
    skip_all,
    fields(
        kubernetes_namespace = %namespace,
        job_name = %job.name,
        max_attempts = polling.max_attempts
    )
)]
pub(crate) async fn wait_until_job_finished(
    client: &dyn ClusterClient,
    observer: &dyn JobObserver,
    job: &JobIdentity,
    namespace: &str,
    polling: &PollingPolicy,
    shutdown: &mut Shutdown,
) -> MonitorReport {
    info!(
        "Waiting up to {} seconds ({} polls) for job '{}' to finish...",
        polling.max_wait().as_secs(),
        polling.max_attempts,
        job.name
    );
    observer.set_attribute("job.name", job.name.clone().into());

    let mut report = MonitorReport {
        job: job.clone(),
        outcome: JobOutcome::TimedOut,
        polls: 0,
        last_counters: JobCounters::default(),
    };

    for attempt in 1..=polling.max_attempts {
        if shutdown.requested() {
            return cancelled(observer, report, shutdown);
        }

        report.polls = attempt;
        observer.set_attribute("monitor.iteration", attempt.into());

        let Some(read) = shutdown
            .run_or_shutdown(client.read_job(&job.name, namespace))
            .await
        else {
            return cancelled(observer, report, shutdown);
        };

        match read {
            Ok(counters) => {
                report.last_counters = counters;
                observer.set_attribute("job.succeeded", counters.succeeded().into());
                observer.set_attribute("job.failed", counters.failed().into());
                observer.add_event("Job status polled");

                match classify(&counters) {
                    Some(JobOutcome::Succeeded) => {
                        observer.add_event("Job completed successfully");
                        info!(
                            "Job '{}' completed successfully after {} poll(s).",
                            job.name, attempt
                        );
                        report.outcome = JobOutcome::Succeeded;
                        return report;
                    }
                    Some(outcome) => {
                        observer.add_event("Job failed");
                        error!(
                            "Job '{}' failed (succeeded: {}, failed: {}).",
                            job.name,
                            counters.succeeded(),
                            counters.failed()
                        );
                        report.outcome = outcome;
                        return report;
                    }
                    None => {
                        info!(
                            "Waiting for job completion... ({}/{}, active: {:?})",
                            attempt, polling.max_attempts, counters.active
                        );
                    }
                }
            }
            Err(e) => {
                observer.record_error(&e);
                observer.add_event("Job status poll failed");
                warn!(
                    "Error while checking job '{}' ({}/{}): {}",
                    job.name, attempt, polling.max_attempts, e
                );
            }
        }

        if attempt < polling.max_attempts
            && shutdown
                .sleep_or_shutdown(polling.interval_after(attempt))
                .await
        {
            return cancelled(observer, report, shutdown);
        }
    }

    observer.add_event("Job monitoring timeout");
    error!(
        "Job monitoring timeout reached for '{}' after {} polls.",
        job.name, report.polls
    );
    report
}

fn cancelled(
    observer: &dyn JobObserver,
    mut report: MonitorReport,
    shutdown: &Shutdown,
) -> MonitorReport {
    observer.add_event("Job monitoring cancelled");
    warn!(
        "Stopped monitoring job '{}' after {} poll(s): shutdown requested ({}).",
        report.job.name,
        report.polls,
        shutdown.reason().unwrap_or("unknown")
    );
    report.outcome = JobOutcome::Cancelled;
    report
}

pub mod error;
mod finalizer;
pub mod probe;
mod submit;
pub mod wait_until_job_finished;

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cluster::ClusterClient;
use crate::config::Config;
use crate::config::polling::PollingPolicy;
use crate::error::{SpannedErr, SpannedExt};
use crate::kubernetes_objects::definition::JobDefinition;
use crate::kubernetes_objects::naming::unique_suffix;
use crate::kubernetes_objects::strategy::MetricsStrategy;
use crate::shutdown::Shutdown;
use crate::telemetry::JobObserver;

use self::error::MetricsJobError;
use self::probe::{Availability, probe_connectivity};
use self::submit::submit_job;
use self::wait_until_job_finished::{JobOutcome, MonitorReport, wait_until_job_finished};

pub const EXIT_SUCCEEDED: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_TIMED_OUT: u8 = 2;
pub const EXIT_UNREACHABLE: u8 = 3;
pub const EXIT_REJECTED: u8 = 4;
pub const EXIT_CONSTRUCTION: u8 = 5;
pub const EXIT_CANCELLED: u8 = 130;

/// One run: probe, build, submit, then monitor a single job to a terminal state.
#[derive(Clone)]
pub struct MetricsJobContext {
    pub(crate) config: Arc<Config>,
    pub(crate) strategy: MetricsStrategy,
    pub(crate) client: Arc<dyn ClusterClient>,
    pub(crate) observer: Arc<dyn JobObserver>,
}

impl MetricsJobContext {
    pub fn new(
        config: Config,
        strategy: MetricsStrategy,
        client: Arc<dyn ClusterClient>,
        observer: Arc<dyn JobObserver>,
    ) -> MetricsJobContext {
        MetricsJobContext {
            config: Arc::new(config),
            strategy,
            client,
            observer,
        }
    }

    pub fn polling(&self) -> PollingPolicy {
        self.config.polling_for(self.strategy)
    }

    #[instrument("metrics_job", skip_all, fields(strategy = %self.strategy))]
    pub async fn run(&self, shutdown: &mut Shutdown) -> Result<MonitorReport, MetricsJobError> {
        info!("Starting {} metrics job routine...", self.strategy);
        self.observer
            .set_attribute("job.namespace", self.config.namespace.clone().into());
        self.observer
            .set_attribute("metrics.strategy", self.strategy.marker().into());

        let result = self.execute(shutdown).await;
        self.finalizer(result)
    }

    async fn execute(&self, shutdown: &mut Shutdown) -> Result<MonitorReport, MetricsJobError> {
        let client = self.client.as_ref();
        let observer = self.observer.as_ref();

        let Some(availability) = shutdown
            .run_or_shutdown(probe_connectivity(client, observer))
            .await
        else {
            return Err(self.cancelled_before_submission(shutdown));
        };
        if let Availability::Unavailable(e) = availability {
            return Err(MetricsJobError::Connectivity(SpannedErr::new(e)));
        }

        let definition = JobDefinition::build(
            self.strategy,
            &self.config.namespace,
            &unique_suffix(),
        )
        .with_span_trace()
        .map_err(MetricsJobError::Construction)?;
        observer.set_attribute("job.containers.count", definition.containers().len().into());

        // A submission in flight is never abandoned, so this is the last point to back out.
        if shutdown.requested() {
            return Err(self.cancelled_before_submission(shutdown));
        }
        let identity = submit_job(client, observer, &definition).await?;

        let report = wait_until_job_finished(
            client,
            observer,
            &identity,
            definition.namespace(),
            &self.polling(),
            shutdown,
        )
        .await;

        if report.outcome == JobOutcome::Cancelled {
            return Err(MetricsJobError::cancelled(
                Some(report.job.name),
                report.polls,
                shutdown,
            ));
        }

        Ok(report)
    }

    fn cancelled_before_submission(&self, shutdown: &Shutdown) -> MetricsJobError {
        self.observer.add_event("Job submission skipped");
        info!(
            "Shutdown requested ({}). Skipping job submission.",
            shutdown.reason().unwrap_or("unknown")
        );
        MetricsJobError::cancelled(None, 0, shutdown)
    }
}

impl JobOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            JobOutcome::Succeeded => EXIT_SUCCEEDED,
            JobOutcome::Failed => EXIT_FAILED,
            JobOutcome::TimedOut => EXIT_TIMED_OUT,
            JobOutcome::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Final status message recorded on the telemetry sink.
    pub fn status_message(self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "Job completed successfully",
            JobOutcome::Failed => "Job failed",
            JobOutcome::TimedOut => "Job monitoring timeout",
            JobOutcome::Cancelled => "Job monitoring cancelled",
        }
    }
}

impl MonitorReport {
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

impl MetricsJobError {
    pub fn exit_code(&self) -> u8 {
        match self {
            MetricsJobError::Connectivity(_) => EXIT_UNREACHABLE,
            MetricsJobError::Construction(_) => EXIT_CONSTRUCTION,
            MetricsJobError::Submission(..) => EXIT_REJECTED,
            MetricsJobError::Cancelled { .. } => JobOutcome::Cancelled.exit_code(),
        }
    }
}

pub mod metrics_job;

pub mod definition;
pub mod naming;
pub mod strategy;

pub(crate) const FIELD_MANAGER_NAME: &str = "metrics-job-runner";
pub const DEFAULT_NAMESPACE: &str = "default";

//! Narrow observer capability that the routine reports its progress through.
//!
//! The routine never talks to a tracing backend directly. It records attributes,
//! events, errors and a final outcome on a [`JobObserver`], and the binary decides
//! where those end up ([`TracingObserver`] in production, [`NoopObserver`] when
//! nothing should be recorded).

use std::fmt::Display;

use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Str(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Ok,
    Error,
}

pub trait JobObserver: Send + Sync {
    fn set_attribute(&self, key: &'static str, value: AttributeValue);

    fn add_event(&self, name: &str);

    fn record_error(&self, err: &(dyn std::error::Error + 'static));

    fn set_outcome(&self, status: OutcomeStatus, message: &str);
}

/// Forwards every observation as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn set_attribute(&self, key: &'static str, value: AttributeValue) {
        debug!(attribute = key, value = %value, "attribute recorded");
    }

    fn add_event(&self, name: &str) {
        debug!(event = name, "event recorded");
    }

    fn record_error(&self, err: &(dyn std::error::Error + 'static)) {
        debug!(error = %err, "error recorded");
    }

    fn set_outcome(&self, status: OutcomeStatus, message: &str) {
        match status {
            OutcomeStatus::Ok => debug!(outcome = "ok", "{message}"),
            OutcomeStatus::Error => debug!(outcome = "error", "{message}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {
    fn set_attribute(&self, _key: &'static str, _value: AttributeValue) {}

    fn add_event(&self, _name: &str) {}

    fn record_error(&self, _err: &(dyn std::error::Error + 'static)) {}

    fn set_outcome(&self, _status: OutcomeStatus, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::{AttributeValue, JobObserver, OutcomeStatus};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Observation {
        Attribute(&'static str, AttributeValue),
        Event(String),
        Error(String),
        Outcome(OutcomeStatus, String),
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        observations: Mutex<Vec<Observation>>,
    }

    impl RecordingObserver {
        pub(crate) fn observations(&self) -> Vec<Observation> {
            self.observations.lock().unwrap().clone()
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.observations()
                .into_iter()
                .filter_map(|o| match o {
                    Observation::Event(name) => Some(name),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn errors(&self) -> Vec<String> {
            self.observations()
                .into_iter()
                .filter_map(|o| match o {
                    Observation::Error(msg) => Some(msg),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn attribute_values(&self, key: &str) -> Vec<AttributeValue> {
            self.observations()
                .into_iter()
                .filter_map(|o| match o {
                    Observation::Attribute(k, v) if k == key => Some(v),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn outcome(&self) -> Option<(OutcomeStatus, String)> {
            self.observations().into_iter().rev().find_map(|o| match o {
                Observation::Outcome(status, msg) => Some((status, msg)),
                _ => None,
            })
        }

        fn push(&self, observation: Observation) {
            self.observations.lock().unwrap().push(observation);
        }
    }

    impl JobObserver for RecordingObserver {
        fn set_attribute(&self, key: &'static str, value: AttributeValue) {
            self.push(Observation::Attribute(key, value));
        }

        fn add_event(&self, name: &str) {
            self.push(Observation::Event(name.to_string()));
        }

        fn record_error(&self, err: &(dyn std::error::Error + 'static)) {
            self.push(Observation::Error(err.to_string()));
        }

        fn set_outcome(&self, status: OutcomeStatus, message: &str) {
            self.push(Observation::Outcome(status, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing::info;

    use super::recording::{Observation, RecordingObserver};
    use super::*;

    #[test]
    fn test_attribute_value_conversions() {
        assert_eq!(AttributeValue::from("a"), AttributeValue::Str("a".into()));
        assert_eq!(AttributeValue::from(3u32), AttributeValue::Int(3));
        assert_eq!(AttributeValue::from(-1i32), AttributeValue::Int(-1));
        assert_eq!(AttributeValue::from(true).to_string(), "true");
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_observer_stays_below_info() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let observer = TracingObserver;
            observer.set_attribute("job.name", "x".into());
            observer.add_event("Job failed");
            observer.record_error(&std::io::Error::other("boom"));
            observer.set_outcome(OutcomeStatus::Error, "Job failed");
            info!("visible");
        });

        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.lines().count(), 1);
        assert!(logs.contains("visible"));
    }

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::default();
        observer.add_event("first");
        observer.set_attribute("job.name", "x".into());
        observer.set_outcome(OutcomeStatus::Ok, "done");

        assert_eq!(
            observer.observations(),
            vec![
                Observation::Event("first".into()),
                Observation::Attribute("job.name", AttributeValue::Str("x".into())),
                Observation::Outcome(OutcomeStatus::Ok, "done".into()),
            ]
        );
    }
}

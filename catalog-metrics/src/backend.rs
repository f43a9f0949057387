use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::datum::MetricDatum;

/// Failure reported by a telemetry backend for a single datum.
#[derive(Debug)]
pub enum TelemetryError {
    /// The backend refused the datum (bad name, conflicting labels, invalid value).
    Rejected(String),
    /// The backend could not be reached.
    Unavailable(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryError::Rejected(msg) => write!(f, "metric rejected: {msg}"),
            TelemetryError::Unavailable(msg) => write!(f, "telemetry backend unavailable: {msg}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

impl From<prometheus::Error> for TelemetryError {
    fn from(err: prometheus::Error) -> Self {
        TelemetryError::Rejected(err.to_string())
    }
}

/// Destination for published metrics.
///
/// Called only from the background publisher task, never on the request path.
pub trait TelemetryBackend: Send + Sync + 'static {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Deliver one datum under `namespace`.
    fn put_metric_data(
        &self,
        namespace: &str,
        datum: &MetricDatum,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send;
}

/// Writes every datum to the `tracing` log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBackend;

impl TelemetryBackend for LogBackend {
    fn name(&self) -> &'static str {
        "log"
    }

    fn put_metric_data(
        &self,
        namespace: &str,
        datum: &MetricDatum,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send {
        tracing::debug!(
            namespace,
            metric = %datum.name,
            value = datum.value,
            unit = %datum.unit,
            dimensions = ?datum.dimensions,
            "metric published"
        );
        std::future::ready(Ok(()))
    }
}

/// A datum captured by [`MemoryBackend`].
#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub namespace: String,
    pub datum: MetricDatum,
}

/// Keeps published data in memory.
///
/// Clones share storage. [`set_failing`](Self::set_failing) makes every
/// delivery fail, which simulates a telemetry outage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<Vec<RecordedMetric>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<RecordedMetric> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All data published under `name`, oldest first.
    pub fn data(&self, name: &str) -> Vec<MetricDatum> {
        self.records()
            .into_iter()
            .filter(|r| r.datum.name == name)
            .map(|r| r.datum)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.data(name).len()
    }
}

impl TelemetryBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn put_metric_data(
        &self,
        namespace: &str,
        datum: &MetricDatum,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(TelemetryError::Unavailable("memory backend set to fail".into()))
        } else {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RecordedMetric {
                    namespace: namespace.to_string(),
                    datum: datum.clone(),
                });
            Ok(())
        };
        std::future::ready(result)
    }
}

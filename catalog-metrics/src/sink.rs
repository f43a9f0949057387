use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::TelemetryBackend;
use crate::datum::{Dimension, MetricDatum, StandardUnit};

/// Clonable, non-blocking handle for publishing metrics.
///
/// Every call enqueues onto a bounded channel with `try_send`. When the
/// queue is full or the publisher is gone the datum is dropped and counted;
/// the caller never waits and never sees an error.
#[derive(Clone)]
pub struct MetricsSink {
    inner: Option<Arc<SinkInner>>,
}

struct SinkInner {
    tx: mpsc::Sender<MetricDatum>,
    dropped: AtomicU64,
}

impl MetricsSink {
    /// A sink that discards everything, for when telemetry is disabled.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn publish(&self, name: &str, value: f64, unit: StandardUnit) {
        self.enqueue(MetricDatum::new(name, value, unit));
    }

    pub fn publish_with_tags(&self, name: &str, value: f64, unit: StandardUnit, tags: Vec<Dimension>) {
        self.enqueue(MetricDatum::new(name, value, unit).with_dimensions(tags));
    }

    /// Number of data dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.inner
            .as_ref()
            .map(|inner| inner.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn enqueue(&self, datum: MetricDatum) {
        let Some(inner) = &self.inner else {
            return;
        };
        match inner.tx.try_send(datum) {
            Ok(()) => {}
            Err(TrySendError::Full(datum)) => {
                let dropped = inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    tracing::warn!(metric = %datum.name, dropped, "metrics queue full, dropping datum");
                }
            }
            Err(TrySendError::Closed(datum)) => {
                inner.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(metric = %datum.name, "metrics publisher stopped, dropping datum");
            }
        }
    }
}

/// Owns the background publisher task.
pub struct PublisherHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Deliver whatever is still queued, then stop the publisher.
    ///
    /// Data published after this call are dropped and counted.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "metrics publisher task failed");
        }
    }
}

/// Start the background publisher and return the sink feeding it.
///
/// Must be called within a tokio runtime.
pub fn spawn_publisher<B: TelemetryBackend>(
    backend: B,
    namespace: impl Into<String>,
    capacity: usize,
) -> (MetricsSink, PublisherHandle) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_publisher(backend, namespace.into(), rx, shutdown.clone()));

    let sink = MetricsSink {
        inner: Some(Arc::new(SinkInner {
            tx,
            dropped: AtomicU64::new(0),
        })),
    };
    (sink, PublisherHandle { shutdown, task })
}

async fn run_publisher<B: TelemetryBackend>(
    backend: B,
    namespace: String,
    mut rx: mpsc::Receiver<MetricDatum>,
    shutdown: CancellationToken,
) {
    tracing::debug!(backend = backend.name(), %namespace, "metrics publisher started");
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(datum) => deliver(&backend, &namespace, &datum).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(datum) = rx.recv().await {
                    deliver(&backend, &namespace, &datum).await;
                }
                break;
            }
        }
    }
    tracing::debug!(backend = backend.name(), "metrics publisher stopped");
}

async fn deliver<B: TelemetryBackend>(backend: &B, namespace: &str, datum: &MetricDatum) {
    match backend.put_metric_data(namespace, datum).await {
        Ok(()) => tracing::trace!(metric = %datum.name, value = datum.value, "metric delivered"),
        Err(e) => tracing::error!(
            backend = backend.name(),
            metric = %datum.name,
            error = %e,
            "failed to publish metric"
        ),
    }
}

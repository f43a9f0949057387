//! Request timing and best-effort telemetry for the catalog service.
//!
//! Observations flow from the HTTP layers into a [`MetricsSink`], which
//! enqueues them on a bounded channel. A background publisher drains the
//! channel into a [`TelemetryBackend`]. Publishing never blocks and never
//! fails the request that produced the metric.
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_metrics::{spawn_publisher, PrometheusBackend, RequestTimerLayer};
//!
//! let backend = PrometheusBackend::new();
//! let (sink, publisher) = spawn_publisher(backend.clone(), "EcommerceProductService", 1024);
//!
//! let app = Router::new()
//!     .route("/api/products", get(list))
//!     .layer(RequestTimerLayer::new(sink));
//!
//! // ... on shutdown
//! publisher.shutdown().await;
//! ```
//!
//! # Series
//!
//! - `RequestDuration` (Milliseconds), `RequestCount` and `ErrorCount` (Count),
//!   tagged with `Method` and `Path`
//! - `RateLimitRejected` (Count), tagged with `Path`
//!
//! `Path` is the matched route template (see [`route_label`]), so the
//! layers must be added with `Router::layer` to label by route.

pub mod backend;
pub mod config;
pub mod datum;
pub mod exporter;
pub mod observation;
pub mod sink;
pub mod timer;

pub use backend::{LogBackend, MemoryBackend, RecordedMetric, TelemetryBackend, TelemetryError};
pub use config::{BackendKind, MetricsConfig};
pub use datum::{Dimension, MetricDatum, StandardUnit};
pub use exporter::PrometheusBackend;
pub use observation::{
    route_label, RequestObservation, ERROR_COUNT, HEALTH_CHECK, RATE_LIMIT_REJECTED,
    REQUEST_COUNT, REQUEST_DURATION, UNMATCHED_PATH,
};
pub use sink::{spawn_publisher, MetricsSink, PublisherHandle};
pub use timer::{RequestTimerLayer, RequestTimerService, CLIENT_CLOSED_REQUEST};

use std::sync::Arc;

use axum::Router;
use catalog_core::{catch_panic_layer, default_trace, CatalogConfig};
use catalog_metrics::{
    spawn_publisher, BackendKind, LogBackend, MetricsConfig, MetricsSink, PrometheusBackend,
    PublisherHandle, RequestTimerLayer,
};
use catalog_rate_limit::{AdmissionLayer, BucketRegistry, Clock, RateLimitConfig, SystemClock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controllers::{health, metrics, products};
use crate::events::ProductEvents;
use crate::repository::InMemoryProductRepository;
use crate::services::ProductService;
use crate::state::AppState;

/// The assembled service: its router plus the background tasks it needs.
pub struct CatalogApp {
    pub router: Router,
    pub registry: BucketRegistry,
    pub state: AppState,
    pub background: Background,
}

/// Background tasks started by [`build`].
pub struct Background {
    cancel: CancellationToken,
    sweeper: JoinHandle<()>,
    event_logger: JoinHandle<()>,
    publisher: Option<PublisherHandle>,
}

impl Background {
    /// Stop the idle sweeper and event logger, then flush queued metrics.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, task) in [("sweeper", self.sweeper), ("event logger", self.event_logger)] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "background task failed");
            }
        }
        if let Some(publisher) = self.publisher {
            publisher.shutdown().await;
        }
        tracing::info!("background tasks stopped");
    }
}

/// Build the service from configuration. Must be called within a tokio runtime.
pub fn build(config: &CatalogConfig) -> CatalogApp {
    build_with_clock(config, Arc::new(SystemClock))
}

/// Like [`build`], with the clock the rate limiter refills against.
pub fn build_with_clock(config: &CatalogConfig, clock: Arc<dyn Clock>) -> CatalogApp {
    let rate_limit = RateLimitConfig::from_catalog_config(config);
    let metrics_config = MetricsConfig::from_catalog_config(config);
    let cancel = CancellationToken::new();

    let (sink, publisher, prometheus) = start_metrics(&metrics_config);

    let registry = BucketRegistry::new(rate_limit.bucket_settings(), clock);
    let sweeper = registry.spawn_sweeper(rate_limit.sweep_interval, rate_limit.idle_ttl, cancel.child_token());

    let events = ProductEvents::default();
    let event_logger = events.spawn_logger(cancel.child_token());

    tracing::info!(
        enabled = rate_limit.enabled,
        capacity = rate_limit.capacity,
        refill_tokens = rate_limit.refill_tokens,
        refill_interval = ?rate_limit.refill_interval,
        trust_forwarded_for = rate_limit.trust_forwarded_for,
        "rate limiting configured"
    );

    let state = AppState {
        products: ProductService::new(InMemoryProductRepository::new(), events),
        sink: sink.clone(),
        prometheus,
    };
    let admission = AdmissionLayer::new(registry.clone(), rate_limit, sink.clone());
    let timer = RequestTimerLayer::new(sink).exclude_paths(metrics_config.exclude_paths);

    CatalogApp {
        router: router(state.clone(), admission, timer),
        registry,
        state,
        background: Background {
            cancel,
            sweeper,
            event_logger,
            publisher,
        },
    }
}

fn start_metrics(
    config: &MetricsConfig,
) -> (MetricsSink, Option<PublisherHandle>, Option<PrometheusBackend>) {
    if !config.enabled {
        tracing::info!("metrics disabled");
        return (MetricsSink::noop(), None, None);
    }
    match config.backend {
        BackendKind::Prometheus => {
            let backend = PrometheusBackend::new();
            let (sink, publisher) =
                spawn_publisher(backend.clone(), config.namespace.clone(), config.queue_capacity);
            (sink, Some(publisher), Some(backend))
        }
        BackendKind::Log => {
            let (sink, publisher) =
                spawn_publisher(LogBackend, config.namespace.clone(), config.queue_capacity);
            (sink, Some(publisher), None)
        }
    }
}

/// Assemble routes and middleware.
///
/// Outermost first: trace, admission, request timer, panic catcher. A panic
/// in a handler is therefore timed as a 500, and rejected requests are never
/// timed.
pub fn router(state: AppState, admission: AdmissionLayer, timer: RequestTimerLayer) -> Router {
    Router::new()
        .merge(products::routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
        .layer(catch_panic_layer())
        .layer(timer)
        .layer(admission)
        .layer(default_trace())
}

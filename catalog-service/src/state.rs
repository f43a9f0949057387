use catalog_metrics::{MetricsSink, PrometheusBackend};

use crate::repository::InMemoryProductRepository;
use crate::services::ProductService;

#[derive(Clone)]
pub struct AppState {
    pub products: ProductService<InMemoryProductRepository>,
    pub sink: MetricsSink,
    /// Present only when metrics are published to Prometheus.
    pub prometheus: Option<PrometheusBackend>,
}

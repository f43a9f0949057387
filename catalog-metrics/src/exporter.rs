use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder, DEFAULT_BUCKETS,
};

use crate::backend::{TelemetryBackend, TelemetryError};
use crate::datum::{MetricDatum, StandardUnit};

/// Exposes published metrics in the Prometheus text format.
///
/// Each metric name is registered lazily on first publish. Count data
/// becomes a `CounterVec` (`<namespace>_<name>_total`). Every other unit
/// becomes a `HistogramVec` suffixed with the unit (`_milliseconds`,
/// `_seconds`, `_bytes`). Dimensions become labels. The label set of a name
/// is fixed by its first datum; later data with other dimensions are rejected.
#[derive(Clone)]
pub struct PrometheusBackend {
    registry: Registry,
    counters: Arc<DashMap<String, CounterVec>>,
    histograms: Arc<DashMap<String, HistogramVec>>,
}

impl PrometheusBackend {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Arc::new(DashMap::new()),
            histograms: Arc::new(DashMap::new()),
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Rejected(e.to_string()))
    }

    fn record(&self, namespace: &str, datum: &MetricDatum) -> Result<(), TelemetryError> {
        if !datum.value.is_finite() {
            return Err(TelemetryError::Rejected(format!(
                "{} has non-finite value {}",
                datum.name, datum.value
            )));
        }

        let label_names: Vec<String> = datum.dimensions.iter().map(|d| snake_case(&d.name)).collect();
        let label_names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let label_values: Vec<&str> = datum.dimensions.iter().map(|d| d.value.as_str()).collect();
        let base = format!("{}_{}", snake_case(namespace), snake_case(&datum.name));
        let help = format!("{} ({})", datum.name, datum.unit);

        match datum.unit {
            StandardUnit::Count => {
                if datum.value < 0.0 {
                    return Err(TelemetryError::Rejected(format!(
                        "{} is a counter and cannot decrease",
                        datum.name
                    )));
                }
                let name = format!("{base}_total");
                let counter = match self.counters.entry(name.clone()) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        let counter = CounterVec::new(Opts::new(name, help), &label_names)?;
                        self.registry.register(Box::new(counter.clone()))?;
                        entry.insert(counter).clone()
                    }
                };
                counter
                    .get_metric_with_label_values(&label_values)?
                    .inc_by(datum.value);
            }
            unit => {
                let name = match unit_suffix(unit) {
                    Some(suffix) => format!("{base}_{suffix}"),
                    None => base,
                };
                let histogram = match self.histograms.entry(name.clone()) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        let opts = HistogramOpts::new(name, help).buckets(buckets_for(unit));
                        let histogram = HistogramVec::new(opts, &label_names)?;
                        self.registry.register(Box::new(histogram.clone()))?;
                        entry.insert(histogram).clone()
                    }
                };
                histogram
                    .get_metric_with_label_values(&label_values)?
                    .observe(datum.value);
            }
        }
        Ok(())
    }
}

impl Default for PrometheusBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryBackend for PrometheusBackend {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn put_metric_data(
        &self,
        namespace: &str,
        datum: &MetricDatum,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send {
        std::future::ready(self.record(namespace, datum))
    }
}

fn unit_suffix(unit: StandardUnit) -> Option<&'static str> {
    match unit {
        StandardUnit::Milliseconds => Some("milliseconds"),
        StandardUnit::Seconds => Some("seconds"),
        StandardUnit::Bytes => Some("bytes"),
        StandardUnit::Count | StandardUnit::None => None,
    }
}

fn buckets_for(unit: StandardUnit) -> Vec<f64> {
    let buckets = match unit {
        // 1ms to ~8s
        StandardUnit::Milliseconds => exponential_buckets(1.0, 2.0, 14),
        StandardUnit::Seconds => exponential_buckets(0.001, 2.0, 14),
        _ => Ok(DEFAULT_BUCKETS.to_vec()),
    };
    buckets.unwrap_or_else(|_| DEFAULT_BUCKETS.to_vec())
}

/// `EcommerceProductService` -> `ecommerce_product_service`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower_or_digit = true;
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Dimension;

    #[test]
    fn snake_cases_names() {
        assert_eq!(snake_case("EcommerceProductService"), "ecommerce_product_service");
        assert_eq!(snake_case("RequestDuration"), "request_duration");
        assert_eq!(snake_case("http-requests"), "http_requests");
        assert_eq!(snake_case("Path"), "path");
    }

    #[test]
    fn counts_become_counters() {
        let backend = PrometheusBackend::new();
        let datum = MetricDatum::new("RequestCount", 1.0, StandardUnit::Count)
            .with_dimensions(vec![Dimension::new("Method", "GET"), Dimension::new("Path", "/api/products")]);
        backend.record("Catalog", &datum).unwrap();
        backend.record("Catalog", &datum).unwrap();

        let text = backend.encode().unwrap();
        assert!(text.contains("catalog_request_count_total{method=\"GET\",path=\"/api/products\"} 2"));
    }

    #[test]
    fn durations_become_histograms() {
        let backend = PrometheusBackend::new();
        let datum = MetricDatum::new("RequestDuration", 12.0, StandardUnit::Milliseconds);
        backend.record("Catalog", &datum).unwrap();

        let text = backend.encode().unwrap();
        assert!(text.contains("catalog_request_duration_milliseconds_count 1"));
    }

    #[test]
    fn conflicting_dimensions_are_rejected() {
        let backend = PrometheusBackend::new();
        let tagged = MetricDatum::new("ErrorCount", 1.0, StandardUnit::Count)
            .with_dimensions(vec![Dimension::new("Path", "/x")]);
        let untagged = MetricDatum::new("ErrorCount", 1.0, StandardUnit::Count);
        backend.record("Catalog", &tagged).unwrap();
        assert!(backend.record("Catalog", &untagged).is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let backend = PrometheusBackend::new();
        let datum = MetricDatum::new("RequestCount", -1.0, StandardUnit::Count);
        assert!(matches!(
            backend.record("Catalog", &datum),
            Err(TelemetryError::Rejected(_))
        ));
    }
}

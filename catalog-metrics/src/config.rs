use catalog_core::CatalogConfig;

/// Which [`TelemetryBackend`](crate::TelemetryBackend) the service publishes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Prometheus,
    Log,
}

/// Configuration for request metrics.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// When false the service uses [`MetricsSink::noop`](crate::MetricsSink::noop).
    pub enabled: bool,
    /// Namespace every datum is published under.
    pub namespace: String,
    pub backend: BackendKind,
    /// Bound of the publish queue; data beyond it are dropped.
    pub queue_capacity: usize,
    /// Path prefixes the request timer ignores.
    pub exclude_paths: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "EcommerceProductService".to_string(),
            backend: BackendKind::Prometheus,
            queue_capacity: 1024,
            exclude_paths: Vec::new(),
        }
    }
}

impl MetricsConfig {
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn exclude_path(mut self, path: &str) -> Self {
        self.exclude_paths.push(path.to_string());
        self
    }

    pub fn disable(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Load from `metrics.*` keys:
    /// - `metrics.enabled`
    /// - `metrics.namespace`
    /// - `metrics.backend` (`prometheus` or `log`)
    /// - `metrics.queue-capacity`
    /// - `metrics.exclude-paths`
    pub fn from_catalog_config(config: &CatalogConfig) -> Self {
        let mut cfg = Self::default();
        if let Ok(enabled) = config.get::<bool>("metrics.enabled") {
            cfg.enabled = enabled;
        }
        if let Ok(namespace) = config.get::<String>("metrics.namespace") {
            cfg.namespace = namespace;
        }
        if let Ok(backend) = config.get::<String>("metrics.backend") {
            cfg.backend = match backend.to_lowercase().as_str() {
                "log" => BackendKind::Log,
                "prometheus" => BackendKind::Prometheus,
                other => {
                    tracing::warn!(backend = other, "unknown metrics backend, using prometheus");
                    BackendKind::Prometheus
                }
            };
        }
        if let Ok(capacity) = config.get::<usize>("metrics.queue-capacity") {
            cfg.queue_capacity = capacity.max(1);
        }
        if let Ok(paths) = config.get::<Vec<String>>("metrics.exclude-paths") {
            cfg.exclude_paths = paths;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_keys() {
        let cfg = MetricsConfig::from_catalog_config(&CatalogConfig::empty());
        assert!(cfg.enabled);
        assert_eq!(cfg.namespace, "EcommerceProductService");
        assert_eq!(cfg.backend, BackendKind::Prometheus);
        assert_eq!(cfg.queue_capacity, 1024);
        assert!(cfg.exclude_paths.is_empty());
    }

    #[test]
    fn reads_metrics_section() {
        let yaml = r#"
metrics:
  enabled: false
  namespace: Catalog
  backend: log
  queue-capacity: 0
  exclude-paths:
    - /metrics
"#;
        let cfg = MetricsConfig::from_catalog_config(&CatalogConfig::from_yaml_str(yaml, "test").unwrap());
        assert!(!cfg.enabled);
        assert_eq!(cfg.namespace, "Catalog");
        assert_eq!(cfg.backend, BackendKind::Log);
        assert_eq!(cfg.queue_capacity, 1);
        assert_eq!(cfg.exclude_paths, vec!["/metrics"]);
    }
}

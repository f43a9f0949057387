use chrono::{DateTime, Utc};

/// Unit attached to a metric datum.
///
/// Rendered with the CloudWatch unit names so a CloudWatch-backed
/// [`TelemetryBackend`](crate::TelemetryBackend) can forward them unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardUnit {
    Milliseconds,
    Seconds,
    Count,
    Bytes,
    None,
}

impl StandardUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardUnit::Milliseconds => "Milliseconds",
            StandardUnit::Seconds => "Seconds",
            StandardUnit::Count => "Count",
            StandardUnit::Bytes => "Bytes",
            StandardUnit::None => "None",
        }
    }
}

impl std::fmt::Display for StandardUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name/value pair qualifying a metric (a label, in Prometheus terms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single named observation, timestamped when it was produced.
#[derive(Debug, Clone)]
pub struct MetricDatum {
    pub name: String,
    pub value: f64,
    pub unit: StandardUnit,
    pub timestamp: DateTime<Utc>,
    pub dimensions: Vec<Dimension>,
}

impl MetricDatum {
    pub fn new(name: impl Into<String>, value: f64, unit: StandardUnit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            timestamp: Utc::now(),
            dimensions: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Value of the dimension called `name`, if present.
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

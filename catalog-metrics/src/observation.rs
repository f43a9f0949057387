use std::time::Duration;

use axum::extract::MatchedPath;
use http::Request;

use crate::datum::{Dimension, StandardUnit};
use crate::sink::MetricsSink;

pub const REQUEST_DURATION: &str = "RequestDuration";
pub const REQUEST_COUNT: &str = "RequestCount";
pub const ERROR_COUNT: &str = "ErrorCount";
pub const RATE_LIMIT_REJECTED: &str = "RateLimitRejected";
pub const HEALTH_CHECK: &str = "HealthCheck";

/// `Path` label for requests that matched no route.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Outcome of one request, built when it finishes and published at once.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub method: String,
    /// Route template, as returned by [`route_label`].
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    pub admitted: bool,
}

impl RequestObservation {
    pub fn admitted(method: String, path: String, status: u16, duration: Duration) -> Self {
        Self {
            method,
            path,
            status,
            duration,
            admitted: true,
        }
    }

    /// A request turned away by the rate limiter before any handling.
    pub fn rejected(method: String, path: String) -> Self {
        Self {
            method,
            path,
            status: 429,
            duration: Duration::ZERO,
            admitted: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Emit the series derived from this observation.
    ///
    /// Rejections only count towards `RateLimitRejected`; they are neither
    /// requests nor errors from the handler's point of view.
    pub fn publish(&self, sink: &MetricsSink) {
        let path = self.path.as_str();

        if !self.admitted {
            sink.publish_with_tags(
                RATE_LIMIT_REJECTED,
                1.0,
                StandardUnit::Count,
                vec![Dimension::new("Path", path)],
            );
            return;
        }

        let tags = vec![
            Dimension::new("Method", self.method.as_str()),
            Dimension::new("Path", path),
        ];
        sink.publish_with_tags(
            REQUEST_DURATION,
            self.duration.as_secs_f64() * 1000.0,
            StandardUnit::Milliseconds,
            tags.clone(),
        );
        if self.is_error() {
            sink.publish_with_tags(REQUEST_COUNT, 1.0, StandardUnit::Count, tags.clone());
            sink.publish_with_tags(ERROR_COUNT, 1.0, StandardUnit::Count, tags);
        } else {
            sink.publish_with_tags(REQUEST_COUNT, 1.0, StandardUnit::Count, tags);
        }
    }
}

/// The `Path` label for `req`: the template of the route it matched, such
/// as `/api/products/{id}`, or [`UNMATCHED_PATH`].
///
/// Labels never come from the raw URI, so clients cannot mint new series.
/// Only layers added with `Router::layer` see the matched route.
pub fn route_label<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_outside_a_router_are_unmatched() {
        let req = Request::get("/api/products/42").body(()).unwrap();
        assert_eq!(route_label(&req), UNMATCHED_PATH);
    }

    #[test]
    fn error_threshold_is_400() {
        let ok = RequestObservation::admitted("GET".into(), "/".into(), 399, Duration::ZERO);
        let err = RequestObservation::admitted("GET".into(), "/".into(), 400, Duration::ZERO);
        assert!(!ok.is_error());
        assert!(err.is_error());
    }

    #[test]
    fn rejected_is_429_and_not_admitted() {
        let obs = RequestObservation::rejected("GET".into(), "/api/products".into());
        assert_eq!(obs.status, 429);
        assert!(!obs.admitted);
    }
}

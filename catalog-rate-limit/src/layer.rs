use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_metrics::{route_label, MetricsSink, RequestObservation};
use http::header::RETRY_AFTER;
use http::{HeaderValue, Request, StatusCode};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::config::RateLimitConfig;
use crate::identity::resolve_client_identity;
use crate::registry::{BucketRegistry, Decision};

struct Admission {
    registry: BucketRegistry,
    config: RateLimitConfig,
    sink: MetricsSink,
}

/// Tower layer that rate-limits every request per client.
///
/// Bypassed paths go straight through. Otherwise, unless rate limiting is
/// disabled, the client's bucket must yield a token or the request is
/// answered with 429 without reaching the inner service.
#[derive(Clone)]
pub struct AdmissionLayer {
    admission: Arc<Admission>,
}

impl AdmissionLayer {
    pub fn new(registry: BucketRegistry, config: RateLimitConfig, sink: MetricsSink) -> Self {
        Self {
            admission: Arc::new(Admission {
                registry,
                config,
                sink,
            }),
        }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            admission: self.admission.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    admission: Arc<Admission>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AdmissionService<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone,
{
    type Response = Response;
    type Error = S::Error;
    type Future = AdmissionFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven ready and leave a fresh clone in
        // its place. A rejected request drops it, releasing whatever
        // `poll_ready` reserved.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let admission = &self.admission;
        let path = req.uri().path();

        if admission.config.is_bypassed(path) || !admission.config.enabled {
            return AdmissionFuture::Admitted {
                inner: inner.call(req),
            };
        }

        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = resolve_client_identity(req.headers(), peer, admission.config.trust_forwarded_for);

        match admission.registry.try_acquire(&client) {
            Decision::Admitted => AdmissionFuture::Admitted {
                inner: inner.call(req),
            },
            Decision::Rejected { retry_after } => {
                tracing::warn!(client = %client, method = %req.method(), path, "Rate limit exceeded");
                RequestObservation::rejected(req.method().to_string(), route_label(&req))
                    .publish(&admission.sink);
                AdmissionFuture::Rejected {
                    response: Some(too_many_requests(retry_after)),
                }
            }
        }
    }
}

pin_project! {
    #[project = AdmissionFutureProj]
    pub enum AdmissionFuture<F> {
        Admitted { #[pin] inner: F },
        Rejected { response: Option<Response> },
    }
}

impl<F, E> Future for AdmissionFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            AdmissionFutureProj::Admitted { inner } => inner.poll(cx),
            AdmissionFutureProj::Rejected { response } => {
                Poll::Ready(Ok(response.take().expect("AdmissionFuture polled after completion")))
            }
        }
    }
}

/// The fixed 429 response, with `Retry-After` in whole seconds (at least 1).
pub fn too_many_requests(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "Too many requests",
            "message": "Rate limit exceeded. Please try again later.",
        })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
    response
}

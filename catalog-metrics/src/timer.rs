use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::ConnectInfo;
use http::{Request, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::observation::{route_label, RequestObservation};
use crate::sink::MetricsSink;

/// Status recorded when the response future is dropped before completing.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Tower layer that times every request and publishes the outcome.
#[derive(Clone)]
pub struct RequestTimerLayer {
    sink: MetricsSink,
    exclude_paths: Arc<[String]>,
}

impl RequestTimerLayer {
    pub fn new(sink: MetricsSink) -> Self {
        Self {
            sink,
            exclude_paths: Arc::from(Vec::new()),
        }
    }

    /// Paths (by prefix) that are passed through without being observed.
    pub fn exclude_paths(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = Arc::from(paths);
        self
    }
}

impl<S> Layer<S> for RequestTimerLayer {
    type Service = RequestTimerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTimerService {
            inner,
            sink: self.sink.clone(),
            exclude_paths: self.exclude_paths.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestTimerService<S> {
    inner: S,
    sink: MetricsSink,
    exclude_paths: Arc<[String]>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTimerService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TimedResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        let observed = !self
            .exclude_paths
            .iter()
            .any(|p| path.starts_with(p.as_str()));

        let guard = if observed {
            let method = req.method().to_string();
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::info!("Request: {} {} from IP: {}", method, path, peer);
            Some(TimerGuard {
                sink: self.sink.clone(),
                method,
                route: route_label(&req),
                path,
                start: Instant::now(),
                finished: false,
            })
        } else {
            None
        };

        TimedResponseFuture {
            inner: self.inner.call(req),
            guard,
        }
    }
}

pin_project! {
    /// Future that publishes the request outcome when the response completes.
    ///
    /// If it is dropped first, the guard publishes the request as
    /// [`CLIENT_CLOSED_REQUEST`].
    pub struct TimedResponseFuture<F> {
        #[pin]
        inner: F,
        guard: Option<TimerGuard>,
    }
}

impl<F, ResBody, E> Future for TimedResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Ready(result) => {
                if let Some(guard) = this.guard.as_mut() {
                    let status = match &result {
                        Ok(response) => response.status().as_u16(),
                        Err(_) => 500,
                    };
                    guard.finish(status);
                }
                Poll::Ready(result)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Finalizes a request exactly once, from `poll` or from `Drop`.
struct TimerGuard {
    sink: MetricsSink,
    method: String,
    path: String,
    route: String,
    start: Instant,
    finished: bool,
}

impl TimerGuard {
    fn finish(&mut self, status: u16) {
        if self.finished {
            return;
        }
        self.finished = true;

        let duration = self.start.elapsed();
        tracing::info!(
            "Response: {} {} - Status: {} - Duration: {}ms",
            self.method,
            self.path,
            status,
            duration.as_millis()
        );
        RequestObservation::admitted(
            std::mem::take(&mut self.method),
            std::mem::take(&mut self.route),
            status,
            duration,
        )
        .publish(&self.sink);
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(CLIENT_CLOSED_REQUEST);
        }
    }
}

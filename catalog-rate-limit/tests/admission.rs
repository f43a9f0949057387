use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use catalog_metrics::{
    spawn_publisher, MemoryBackend, MetricsSink, RequestTimerLayer, ERROR_COUNT,
    RATE_LIMIT_REJECTED, REQUEST_COUNT, UNMATCHED_PATH,
};
use catalog_rate_limit::{AdmissionLayer, BucketRegistry, ManualClock, RateLimitConfig};
use catalog_test::TestApp;
use tower::limit::ConcurrencyLimit;
use tower::{service_fn, Layer, Service, ServiceExt};

const REJECTION_BODY: &str =
    r#"{"error":"Too many requests","message":"Rate limit exceeded. Please try again later."}"#;

fn limited_app(config: RateLimitConfig, clock: ManualClock, sink: MetricsSink) -> (TestApp, BucketRegistry) {
    let registry = BucketRegistry::new(config.bucket_settings(), Arc::new(clock));
    let router = Router::new()
        .route("/api/products", get(|| async { "[]" }))
        .route("/actuator/health", get(|| async { r#"{"status":"UP"}"# }))
        .layer(AdmissionLayer::new(registry.clone(), config, sink));
    let app = TestApp::new(router).with_peer("1.2.3.4:50000".parse().unwrap());
    (app, registry)
}

fn two_per_minute() -> RateLimitConfig {
    RateLimitConfig::new(2, 2, Duration::from_secs(60))
}

#[tokio::test]
async fn third_request_is_rejected_with_fixed_body() {
    let (app, _) = limited_app(two_per_minute(), ManualClock::new(), MetricsSink::noop());

    app.get("/api/products").send().await.assert_ok();
    app.get("/api/products").send().await.assert_ok();
    let resp = app.get("/api/products").send().await.assert_too_many_requests();

    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(resp.text(), REJECTION_BODY);
    assert_eq!(resp.header("retry-after"), Some("60"));
}

#[tokio::test]
async fn refill_after_interval_admits_again() {
    let clock = ManualClock::new();
    let (app, _) = limited_app(two_per_minute(), clock.clone(), MetricsSink::noop());

    for _ in 0..2 {
        app.get("/api/products").send().await.assert_ok();
    }
    app.get("/api/products").send().await.assert_too_many_requests();

    clock.advance(Duration::from_secs(60));
    app.get("/api/products").send().await.assert_ok();
    app.get("/api/products").send().await.assert_ok();
    app.get("/api/products").send().await.assert_too_many_requests();
}

#[tokio::test]
async fn health_probe_bypasses_exhausted_bucket() {
    let (app, registry) = limited_app(two_per_minute(), ManualClock::new(), MetricsSink::noop());

    for _ in 0..3 {
        app.get("/api/products").send().await;
    }
    app.get("/api/products").send().await.assert_too_many_requests();

    for _ in 0..5 {
        app.get("/actuator/health").send().await.assert_ok();
    }
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn bypass_does_not_create_buckets() {
    let (app, registry) = limited_app(two_per_minute(), ManualClock::new(), MetricsSink::noop());
    app.get("/actuator/health").send().await.assert_ok();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn forwarded_for_selects_the_bucket() {
    let (app, registry) = limited_app(two_per_minute(), ManualClock::new(), MetricsSink::noop());

    for _ in 0..2 {
        app.get("/api/products")
            .header("x-forwarded-for", "9.9.9.9, 10.0.0.1")
            .peer("10.0.0.5:1234".parse().unwrap())
            .send()
            .await
            .assert_ok();
    }
    assert!(registry.contains("9.9.9.9"));
    assert!(!registry.contains("10.0.0.5"));

    // same forwarded client, different hop
    app.get("/api/products")
        .header("x-forwarded-for", "9.9.9.9")
        .peer("10.0.0.6:1234".parse().unwrap())
        .send()
        .await
        .assert_too_many_requests();

    // the proxy's own bucket is untouched
    app.get("/api/products")
        .peer("10.0.0.5:1234".parse().unwrap())
        .send()
        .await
        .assert_ok();
}

#[tokio::test]
async fn untrusted_forwarded_for_keys_on_peer() {
    let config = two_per_minute().with_trust_forwarded_for(false);
    let (app, registry) = limited_app(config, ManualClock::new(), MetricsSink::noop());

    app.get("/api/products")
        .header("x-forwarded-for", "9.9.9.9")
        .send()
        .await
        .assert_ok();
    assert!(registry.contains("1.2.3.4"));
    assert!(!registry.contains("9.9.9.9"));
}

#[tokio::test]
async fn missing_peer_shares_unknown_bucket() {
    let (app, registry) = limited_app(two_per_minute(), ManualClock::new(), MetricsSink::noop());
    app.get("/api/products").no_peer().send().await.assert_ok();
    assert!(registry.contains("unknown"));
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let config = RateLimitConfig {
        enabled: false,
        ..two_per_minute()
    };
    let (app, registry) = limited_app(config, ManualClock::new(), MetricsSink::noop());

    for _ in 0..10 {
        app.get("/api/products").send().await.assert_ok();
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn rejection_is_counted_apart_from_errors() {
    let backend = MemoryBackend::new();
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 64);
    let clock = ManualClock::new();
    let config = RateLimitConfig::new(1, 1, Duration::from_secs(60));
    let registry = BucketRegistry::new(config.bucket_settings(), Arc::new(clock));

    let router = Router::new()
        .route("/api/products/{id}", get(|| async { StatusCode::OK }))
        .layer(RequestTimerLayer::new(sink.clone()))
        .layer(AdmissionLayer::new(registry, config, sink));
    let app = TestApp::new(router).with_peer("1.2.3.4:1".parse().unwrap());

    app.get("/api/products/7").send().await.assert_ok();
    app.get("/api/products/7").send().await.assert_too_many_requests();
    publisher.shutdown().await;

    let rejected = backend.data(RATE_LIMIT_REJECTED);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].dimension("Path"), Some("/api/products/{id}"));
    // only the admitted request reached the timer
    assert_eq!(backend.count(REQUEST_COUNT), 1);
    assert_eq!(backend.count(ERROR_COUNT), 0);
}

#[tokio::test]
async fn rejected_unrouted_paths_share_one_label() {
    let backend = MemoryBackend::new();
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 64);
    let (app, _) = limited_app(RateLimitConfig::new(1, 1, Duration::from_secs(60)), ManualClock::new(), sink);

    app.get("/api/products").send().await.assert_ok();
    for i in 0..3 {
        app.get(&format!("/junk-{i}")).send().await.assert_too_many_requests();
    }
    publisher.shutdown().await;

    let rejected = backend.data(RATE_LIMIT_REJECTED);
    assert_eq!(rejected.len(), 3);
    assert!(rejected.iter().all(|d| d.dimension("Path") == Some(UNMATCHED_PATH)));
}

#[tokio::test]
async fn rejection_releases_inner_readiness() {
    let registry = BucketRegistry::new(
        RateLimitConfig::new(0, 0, Duration::from_secs(60)).bucket_settings(),
        Arc::new(ManualClock::new()),
    );
    let handler = service_fn(|_req: Request<Body>| async {
        Ok::<Response, Infallible>(StatusCode::OK.into_response())
    });
    let layer = AdmissionLayer::new(
        registry,
        RateLimitConfig::new(0, 0, Duration::from_secs(60)),
        MetricsSink::noop(),
    );
    let mut first = layer.layer(ConcurrencyLimit::new(handler, 1));
    let mut second = first.clone();

    let response = first
        .ready()
        .await
        .unwrap()
        .call(Request::get("/api/products").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::timeout(Duration::from_secs(1), second.ready())
        .await
        .expect("concurrency slot still held after rejection")
        .unwrap();
}

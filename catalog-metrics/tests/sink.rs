use catalog_metrics::{
    spawn_publisher, Dimension, MemoryBackend, MetricsSink, StandardUnit,
};

#[tokio::test]
async fn shutdown_drains_queued_data() {
    let backend = MemoryBackend::new();
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 64);

    for _ in 0..10 {
        sink.publish("RequestCount", 1.0, StandardUnit::Count);
    }
    sink.publish_with_tags(
        "ErrorCount",
        1.0,
        StandardUnit::Count,
        vec![Dimension::new("Path", "/api/products")],
    );
    publisher.shutdown().await;

    assert_eq!(backend.count("RequestCount"), 10);
    let errors = backend.data("ErrorCount");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].dimension("Path"), Some("/api/products"));
    assert!(backend.records().iter().all(|r| r.namespace == "Catalog"));
    assert_eq!(sink.dropped(), 0);
}

#[tokio::test]
async fn failing_backend_does_not_reach_the_caller() {
    let backend = MemoryBackend::new();
    backend.set_failing(true);
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 8);

    sink.publish("HealthCheck", 1.0, StandardUnit::Count);
    publisher.shutdown().await;

    assert!(backend.records().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn full_queue_drops_and_counts() {
    let backend = MemoryBackend::new();
    // On a current-thread runtime the publisher cannot run until we yield.
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 2);

    for _ in 0..5 {
        sink.publish("RequestCount", 1.0, StandardUnit::Count);
    }
    assert_eq!(sink.dropped(), 3);

    publisher.shutdown().await;
    assert_eq!(backend.count("RequestCount"), 2);
}

#[tokio::test]
async fn publishing_after_shutdown_is_dropped() {
    let backend = MemoryBackend::new();
    let (sink, publisher) = spawn_publisher(backend.clone(), "Catalog", 8);
    publisher.shutdown().await;

    sink.publish("RequestCount", 1.0, StandardUnit::Count);
    assert_eq!(sink.dropped(), 1);
    assert!(backend.records().is_empty());
}

#[test]
fn noop_sink_accepts_everything() {
    let sink = MetricsSink::noop();
    assert!(!sink.is_enabled());
    sink.publish("RequestCount", 1.0, StandardUnit::Count);
    assert_eq!(sink.dropped(), 0);
}

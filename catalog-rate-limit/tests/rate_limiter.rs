use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use catalog_rate_limit::{BucketRegistry, BucketSettings, Clock, Decision, ManualClock, TokenBucket};
use tokio_util::sync::CancellationToken;

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn fresh_bucket_admits_at_most_capacity() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(5, 5, MINUTE), now);
    let admitted = (0..20).filter(|_| bucket.try_consume_at(1, now)).count();
    assert_eq!(admitted, 5);
    assert_eq!(bucket.available_tokens_at(now), 0);
}

#[test]
fn full_bucket_does_not_overflow() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(3, 3, MINUTE), now);
    assert_eq!(bucket.available_tokens_at(now + MINUTE), 3);
    assert_eq!(bucket.available_tokens_at(now + 10 * MINUTE), 3);
}

#[test]
fn depleted_bucket_refills_exactly_refill_tokens() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(10, 4, MINUTE), now);
    while bucket.try_consume_at(1, now) {}

    let later = now + MINUTE;
    let admitted = (0..10).filter(|_| bucket.try_consume_at(1, later)).count();
    assert_eq!(admitted, 4);
}

#[test]
fn no_refill_before_a_whole_interval() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(1, 1, MINUTE), now);
    assert!(bucket.try_consume_at(1, now));
    assert!(!bucket.try_consume_at(1, now + Duration::from_secs(59)));
    assert!(bucket.try_consume_at(1, now + MINUTE));
}

#[test]
fn rejected_request_leaves_count_unchanged() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(3, 3, MINUTE), now);
    assert!(!bucket.try_consume_at(4, now));
    assert_eq!(bucket.available_tokens_at(now), 3);
    assert!(bucket.try_consume_at(3, now));
}

#[test]
fn zero_tokens_and_zero_capacity_reject() {
    let now = Instant::now();
    let bucket = TokenBucket::new(BucketSettings::new(3, 3, MINUTE), now);
    assert!(!bucket.try_consume_at(0, now));
    assert_eq!(bucket.available_tokens_at(now), 3);

    let empty = TokenBucket::new(BucketSettings::new(0, 5, MINUTE), now);
    assert!(!empty.try_consume_at(1, now));
    assert!(!empty.try_consume_at(1, now + MINUTE));
}

#[test]
fn concurrent_consumers_never_overdraw() {
    let bucket = Arc::new(TokenBucket::new(BucketSettings::new(100, 100, MINUTE), Instant::now()));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bucket = bucket.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..50).filter(|_| bucket.try_consume(1)).count()
            })
        })
        .collect();
    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 100);
}

#[test]
fn concurrent_first_access_creates_one_bucket() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(10, 10, MINUTE), Arc::new(clock));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let bucket = registry.get_or_create("1.2.3.4");
                let ptr = Arc::as_ptr(&bucket) as usize;
                (ptr, bucket.try_consume(1))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let distinct: HashSet<usize> = results.iter().map(|(ptr, _)| *ptr).collect();
    assert_eq!(distinct.len(), 1);
    assert_eq!(registry.len(), 1);
    // 16 callers share one bucket of 10
    assert_eq!(results.iter().filter(|(_, ok)| *ok).count(), 10);
}

#[test]
fn clients_have_independent_buckets() {
    let registry = BucketRegistry::new(BucketSettings::new(1, 1, MINUTE), Arc::new(ManualClock::new()));
    assert!(registry.try_acquire("a").is_admitted());
    assert!(!registry.try_acquire("a").is_admitted());
    assert!(registry.try_acquire("b").is_admitted());
    assert_eq!(registry.len(), 2);
}

#[test]
fn rejection_reports_time_until_refill() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(1, 1, MINUTE), Arc::new(clock.clone()));
    assert!(registry.try_acquire("c").is_admitted());
    clock.advance(Duration::from_secs(20));
    assert_eq!(
        registry.try_acquire("c"),
        Decision::Rejected {
            retry_after: Duration::from_secs(40)
        }
    );
}

#[test]
fn sweep_removes_only_idle_buckets() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(5, 5, MINUTE), Arc::new(clock.clone()));

    registry.try_acquire("old");
    clock.advance(Duration::from_secs(300));
    registry.try_acquire("recent");
    clock.advance(Duration::from_secs(300));

    assert_eq!(registry.sweep_idle(Duration::from_secs(600)), 1);
    assert!(!registry.contains("old"));
    assert!(registry.contains("recent"));
}

#[test]
fn swept_client_starts_with_a_full_bucket() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(1, 1, MINUTE), Arc::new(clock.clone()));
    assert!(registry.try_acquire("x").is_admitted());
    assert!(!registry.try_acquire("x").is_admitted());

    clock.advance(Duration::from_secs(600));
    registry.sweep_idle(Duration::from_secs(600));
    let bucket = registry.get_or_create("x");
    assert_eq!(bucket.available_tokens_at(clock.now()), 1);
}

#[test]
fn sweep_keeps_depleted_buckets_until_refilled() {
    let clock = ManualClock::new();
    let hour = Duration::from_secs(3600);
    let idle_ttl = Duration::from_secs(600);
    let registry = BucketRegistry::new(BucketSettings::new(1, 1, hour), Arc::new(clock.clone()));
    assert!(registry.try_acquire("x").is_admitted());
    assert!(!registry.try_acquire("x").is_admitted());

    clock.advance(idle_ttl);
    assert_eq!(registry.sweep_idle(idle_ttl), 0);
    assert!(!registry.try_acquire("x").is_admitted());

    clock.advance(hour);
    assert_eq!(registry.sweep_idle(idle_ttl), 1);
    assert!(registry.try_acquire("x").is_admitted());
}

#[test]
fn sweep_never_evicts_buckets_that_cannot_refill() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(1, 1, Duration::ZERO), Arc::new(clock.clone()));
    registry.try_acquire("x");

    clock.advance(Duration::from_secs(86_400));
    assert_eq!(registry.sweep_idle(Duration::from_secs(600)), 0);
    assert!(!registry.try_acquire("x").is_admitted());
}

#[tokio::test(start_paused = true)]
async fn sweeper_runs_until_cancelled() {
    let clock = ManualClock::new();
    let registry = BucketRegistry::new(BucketSettings::new(5, 5, MINUTE), Arc::new(clock.clone()));
    registry.try_acquire("idle");
    clock.advance(Duration::from_secs(600));

    let cancel = CancellationToken::new();
    let task = registry.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(600), cancel.clone());
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(registry.is_empty());

    cancel.cancel();
    task.await.unwrap();
}

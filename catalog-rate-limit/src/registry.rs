use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bucket::{BucketSettings, TokenBucket};
use crate::clock::Clock;

/// Outcome of asking the registry for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    /// `retry_after` is the time until the bucket next refills.
    Rejected { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }
}

/// Concurrent map from client identity to that client's bucket.
///
/// Buckets are created on first use. Creation goes through the map's entry
/// API, so concurrent first requests for the same identity all end up with
/// the same bucket. Clones share the same buckets.
#[derive(Clone)]
pub struct BucketRegistry {
    buckets: Arc<DashMap<String, Arc<TokenBucket>>>,
    settings: BucketSettings,
    clock: Arc<dyn Clock>,
}

impl BucketRegistry {
    pub fn new(settings: BucketSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> BucketSettings {
        self.settings
    }

    /// The bucket for `client_id`, created full if this is its first request.
    pub fn get_or_create(&self, client_id: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(client_id) {
            return bucket.value().clone();
        }
        // The shard guard is dropped at the end of this statement.
        self.buckets
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.settings, self.clock.now())))
            .value()
            .clone()
    }

    /// Take one token from `client_id`'s bucket.
    pub fn try_acquire(&self, client_id: &str) -> Decision {
        let bucket = self.get_or_create(client_id);
        let now = self.clock.now();
        if bucket.try_consume_at(1, now) {
            Decision::Admitted
        } else {
            Decision::Rejected {
                retry_after: bucket.time_until_refill_at(now),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.buckets.contains_key(client_id)
    }

    /// Remove buckets that have not been used for at least `idle_ttl` and
    /// have refilled to capacity. Returns how many were removed.
    ///
    /// A bucket that is still short of tokens is kept however long it has
    /// been idle, otherwise recreating it would hand the client a full bucket
    /// before its refill is due.
    pub fn sweep_idle(&self, idle_ttl: Duration) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let keep = bucket.idle_for(now) < idle_ttl || !bucket.is_full_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Run [`sweep_idle`](Self::sweep_idle) every `every` until `cancel` fires.
    pub fn spawn_sweeper(
        &self,
        every: Duration,
        idle_ttl: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every.max(Duration::from_millis(1)));
            // the first tick completes immediately
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = registry.sweep_idle(idle_ttl);
                        if removed > 0 {
                            tracing::debug!(removed, remaining = registry.len(), "swept idle rate-limit buckets");
                        }
                    }
                    _ = cancel.cancelled() => {
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("settings", &self.settings)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shape shared by every bucket a registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSettings {
    pub capacity: u64,
    pub refill_tokens: u64,
    /// A zero interval disables refilling.
    pub refill_interval: Duration,
}

impl BucketSettings {
    pub fn new(capacity: u64, refill_tokens: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_interval,
        }
    }
}

struct BucketState {
    tokens: u64,
    last_refill: Instant,
    last_seen: Instant,
}

/// One client's token reservoir.
///
/// Refill is interval-based: after `n` whole refill intervals have elapsed,
/// `n * refill_tokens` are added (capped at capacity) and the refill
/// timestamp moves forward by exactly `n` intervals, so partial progress
/// towards the next interval carries over. Refill and consume happen under
/// the bucket's own lock.
pub struct TokenBucket {
    settings: BucketSettings,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket whose refill clock starts at `now`.
    pub fn new(settings: BucketSettings, now: Instant) -> Self {
        Self {
            settings,
            state: Mutex::new(BucketState {
                tokens: settings.capacity,
                last_refill: now,
                last_seen: now,
            }),
        }
    }

    pub fn settings(&self) -> BucketSettings {
        self.settings
    }

    /// Try to take `tokens` using the system clock.
    pub fn try_consume(&self, tokens: u64) -> bool {
        self.try_consume_at(tokens, Instant::now())
    }

    /// Refill up to `now`, then take `tokens` if that many are available.
    ///
    /// Requests for zero tokens are rejected. On rejection the count is left
    /// unchanged.
    pub fn try_consume_at(&self, tokens: u64, now: Instant) -> bool {
        let mut state = self.lock();
        self.refill(&mut state, now);
        if now > state.last_seen {
            state.last_seen = now;
        }

        if tokens == 0 || state.tokens < tokens {
            return false;
        }
        state.tokens -= tokens;
        true
    }

    /// Tokens available as of `now`.
    pub fn available_tokens_at(&self, now: Instant) -> u64 {
        let mut state = self.lock();
        self.refill(&mut state, now);
        state.tokens
    }

    /// Whether the bucket holds its full capacity as of `now`.
    pub fn is_full_at(&self, now: Instant) -> bool {
        self.available_tokens_at(now) >= self.settings.capacity
    }

    /// Time left until the next whole refill interval completes.
    pub fn time_until_refill_at(&self, now: Instant) -> Duration {
        let interval = self.settings.refill_interval;
        if interval.is_zero() {
            return Duration::ZERO;
        }
        let state = self.lock();
        let (_, into_interval) = whole_intervals(now.saturating_duration_since(state.last_refill), interval);
        interval - into_interval
    }

    /// How long since the bucket was last asked for a token.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.lock().last_seen)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let interval = self.settings.refill_interval;
        if interval.is_zero() {
            return;
        }
        let elapsed = now.saturating_duration_since(state.last_refill);
        let (intervals, remainder) = whole_intervals(elapsed, interval);
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(u128::from(self.settings.refill_tokens));
        let added = u64::try_from(added).unwrap_or(u64::MAX);
        state.tokens = state.tokens.saturating_add(added).min(self.settings.capacity);
        state.last_refill = now - remainder;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenBucket")
            .field("settings", &self.settings)
            .field("tokens", &state.tokens)
            .finish()
    }
}

/// Split `elapsed` into whole `interval`s and what is left over.
fn whole_intervals(elapsed: Duration, interval: Duration) -> (u128, Duration) {
    let interval_nanos = interval.as_nanos();
    let elapsed_nanos = elapsed.as_nanos();
    let remainder = elapsed_nanos % interval_nanos;
    // remainder < interval, which itself fits in a Duration
    let remainder = Duration::new(
        (remainder / 1_000_000_000) as u64,
        (remainder % 1_000_000_000) as u32,
    );
    (elapsed_nanos / interval_nanos, remainder)
}

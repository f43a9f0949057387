use std::time::Duration;

use catalog_core::config::parse_duration;
use catalog_core::CatalogConfig;

use crate::bucket::BucketSettings;

const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Settings for the admission filter and the buckets it creates.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// When false every request is admitted without touching a bucket.
    pub enabled: bool,
    pub capacity: u64,
    pub refill_tokens: u64,
    pub refill_interval: Duration,
    /// Path prefixes that are never rate-limited.
    pub bypass_paths: Vec<String>,
    /// Key clients on the first `X-Forwarded-For` entry when present.
    /// Any client can set that header, so only enable behind a proxy that
    /// overwrites it.
    pub trust_forwarded_for: bool,
    pub idle_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            refill_tokens: 100,
            refill_interval: DEFAULT_REFILL_INTERVAL,
            bypass_paths: vec![
                "/actuator/health".to_string(),
                "/actuator/info".to_string(),
                "/health".to_string(),
            ],
            trust_forwarded_for: true,
            idle_ttl: DEFAULT_IDLE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RateLimitConfig {
    /// `capacity` requests, refilled by `refill_tokens` every `refill_interval`.
    pub fn new(capacity: u64, refill_tokens: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_interval,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_bypass_paths(mut self, paths: Vec<String>) -> Self {
        self.bypass_paths = paths;
        self
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn bucket_settings(&self) -> BucketSettings {
        BucketSettings::new(self.capacity, self.refill_tokens, self.refill_interval)
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Load from `rate-limit.*` keys. Missing keys keep their defaults and
    /// malformed durations fall back with a warning; loading never fails.
    pub fn from_catalog_config(config: &CatalogConfig) -> Self {
        let mut cfg = Self::default();
        if let Ok(enabled) = config.get::<bool>("rate-limit.enabled") {
            cfg.enabled = enabled;
        }
        if let Ok(capacity) = config.get::<u64>("rate-limit.capacity") {
            cfg.capacity = capacity;
        }
        if let Ok(tokens) = config.get::<u64>("rate-limit.refill-tokens") {
            cfg.refill_tokens = tokens;
        }
        if let Ok(raw) = config.get::<String>("rate-limit.refill-duration") {
            cfg.refill_interval = parse_refill_interval(&raw);
        }
        if let Ok(paths) = config.get::<Vec<String>>("rate-limit.bypass-paths") {
            cfg.bypass_paths = paths;
        }
        if let Ok(trust) = config.get::<bool>("rate-limit.trust-forwarded-for") {
            cfg.trust_forwarded_for = trust;
        }
        if let Ok(raw) = config.get::<String>("rate-limit.idle-ttl") {
            cfg.idle_ttl = duration_or("rate-limit.idle-ttl", &raw, DEFAULT_IDLE_TTL);
        }
        if let Ok(raw) = config.get::<String>("rate-limit.sweep-interval") {
            cfg.sweep_interval = duration_or("rate-limit.sweep-interval", &raw, DEFAULT_SWEEP_INTERVAL);
        }
        cfg
    }
}

/// Parse a refill interval, falling back to one minute when `raw` is not
/// `<integer><s|m|h>`.
pub fn parse_refill_interval(raw: &str) -> Duration {
    duration_or("rate-limit.refill-duration", raw, DEFAULT_REFILL_INTERVAL)
}

fn duration_or(key: &str, raw: &str, default: Duration) -> Duration {
    parse_duration(raw).unwrap_or_else(|| {
        tracing::warn!(key, value = raw, default = ?default, "invalid duration, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_interval_falls_back_to_one_minute() {
        assert_eq!(parse_refill_interval("30s"), Duration::from_secs(30));
        assert_eq!(parse_refill_interval("2h"), Duration::from_secs(7200));
        assert_eq!(parse_refill_interval("1 minute"), Duration::from_secs(60));
        assert_eq!(parse_refill_interval(""), Duration::from_secs(60));
        assert_eq!(parse_refill_interval("0s"), Duration::from_secs(60));
    }

    #[test]
    fn defaults_match_an_empty_config() {
        let cfg = RateLimitConfig::from_catalog_config(&CatalogConfig::empty());
        assert!(cfg.enabled);
        assert_eq!(cfg.capacity, 100);
        assert_eq!(cfg.refill_tokens, 100);
        assert_eq!(cfg.refill_interval, Duration::from_secs(60));
        assert!(cfg.trust_forwarded_for);
        assert!(cfg.is_bypassed("/actuator/health"));
        assert!(cfg.is_bypassed("/actuator/info"));
        assert!(cfg.is_bypassed("/health/live"));
        assert!(!cfg.is_bypassed("/api/products"));
    }

    #[test]
    fn reads_rate_limit_section() {
        let yaml = r#"
rate-limit:
  enabled: false
  capacity: 5
  refill-tokens: 2
  refill-duration: 10s
  bypass-paths: [/ping]
  trust-forwarded-for: false
  idle-ttl: bogus
"#;
        let cfg = RateLimitConfig::from_catalog_config(&CatalogConfig::from_yaml_str(yaml, "test").unwrap());
        assert!(!cfg.enabled);
        assert_eq!(cfg.capacity, 5);
        assert_eq!(cfg.refill_tokens, 2);
        assert_eq!(cfg.refill_interval, Duration::from_secs(10));
        assert_eq!(cfg.bypass_paths, vec!["/ping"]);
        assert!(!cfg.trust_forwarded_for);
        assert_eq!(cfg.idle_ttl, Duration::from_secs(600));
    }
}

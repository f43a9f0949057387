//! Per-client token-bucket admission control.
//!
//! [`AdmissionLayer`] resolves a client identity for each request, takes a
//! token from that client's [`TokenBucket`] in the shared [`BucketRegistry`],
//! and either forwards the request or answers 429.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_rate_limit::{AdmissionLayer, BucketRegistry, RateLimitConfig, SystemClock};
//!
//! let config = RateLimitConfig::from_catalog_config(&catalog_config);
//! let registry = BucketRegistry::new(config.bucket_settings(), Arc::new(SystemClock));
//! let app = Router::new()
//!     .route("/api/products", get(list))
//!     .layer(AdmissionLayer::new(registry, config, sink));
//! ```

pub mod bucket;
pub mod clock;
pub mod config;
pub mod identity;
pub mod layer;
pub mod registry;

pub use bucket::{BucketSettings, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{parse_refill_interval, RateLimitConfig};
pub use identity::{resolve_client_identity, UNKNOWN_CLIENT, X_FORWARDED_FOR};
pub use layer::{too_many_requests, AdmissionFuture, AdmissionLayer, AdmissionService};
pub use registry::{BucketRegistry, Decision};

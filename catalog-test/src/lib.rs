//! In-process HTTP testing for the catalog service.
//!
//! [`TestApp`] drives an `axum::Router` through `tower::ServiceExt::oneshot`,
//! so requests never touch a socket. A request can carry a simulated peer
//! address, which the rate limiter and request logger read from
//! `ConnectInfo<SocketAddr>`.

mod app;
mod json_path;

pub use app::{TestApp, TestRequest, TestResponse};
pub use json_path::{resolve_path, PathToken};

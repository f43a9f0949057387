//! Product catalog HTTP service.
//!
//! Every request passes a per-client token-bucket rate limiter, then a
//! request timer that publishes duration, count and error metrics. Products
//! live in an in-memory repository behind the [`ProductRepository`] trait.
//!
//! [`ProductRepository`]: repository::ProductRepository

pub mod app;
pub mod controllers;
pub mod events;
pub mod models;
pub mod repository;
pub mod services;
pub mod state;

pub use app::{build, build_with_clock, router, Background, CatalogApp};
pub use state::AppState;

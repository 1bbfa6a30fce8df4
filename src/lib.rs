//! Shortlink Gateway Library
//!
//! Resilience and data-fallback core of a URL-shortener gateway: per-backend
//! circuit breakers, a retrying client, backend health tracking, cache-first
//! short code resolution and a fan-out health report.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod redirect;
pub mod resilience;
pub mod storage;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};

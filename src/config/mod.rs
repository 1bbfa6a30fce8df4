//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by reference with every subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers and health records are sized from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CircuitBreakerConfig, DurableConfig, GatewayConfig, HealthCheckConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, ReconnectConfig, RetryConfig, ServiceConfig,
    StorageConfig,
};

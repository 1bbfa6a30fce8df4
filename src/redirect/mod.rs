//! Short link read and write paths over the cache and durable tiers.

pub mod resolver;
pub mod writer;

pub use resolver::{FallbackResolver, LookupResult, LookupSource, TierHealth};
pub use writer::{generate_code, LinkWriter};

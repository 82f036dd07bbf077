//! # Comunidad Cache
//!
//! Read-through and write-through caching for every entity type.
//!
//! ```text
//! BaseService<S>
//!   ↓
//! CacheableService        (entity type, TTL, enabled flag)
//!   ↓
//! CacheService            (prefix, fail-open, stats, invalidation)
//!   ↓  Arc<dyn CacheStore>
//! CacheClient             (Redis command + pub/sub connections)
//! InMemoryCacheStore      (process-local)
//! ```
//!
//! Cache failures never reach callers; a dead cache behaves like an empty one.

pub mod cacheable;
pub mod client;
pub mod health;
pub mod keys;
pub mod listener;
pub mod memory;
pub mod service;
pub mod store;

pub use cacheable::{CacheableConfig, CacheableService};
pub use client::{CacheClient, RetryPolicy};
pub use health::{CacheHealth, CacheHealthCheck};
pub use listener::InvalidationListener;
pub use memory::InMemoryCacheStore;
pub use service::{CacheService, CacheStats, InvalidationStrategy, SetOptions};
pub use store::CacheStore;

//! # Comunidad Service
//!
//! Entity services for the Comunidad backend. Each entity is a
//! [`BaseService`] parameterized by an [`EntitySchema`]:
//!
//! ```text
//! BaseService<S>
//!   ├── CacheableService   item / list / query / stats keys of S::ENTITY_TYPE
//!   └── BackingStore       S::TABLE
//! RelationshipService      junction tables, uncached
//! ```
//!
//! [`Services`] wires all of them from an `AppConfig`.

pub mod base;
pub mod entities;
pub mod relationship;
pub mod wiring;

pub use base::{BaseService, EntitySchema, EntityStats, ListOptions};
pub use entities::*;
pub use relationship::{Junction, RelationshipService};
pub use wiring::Services;

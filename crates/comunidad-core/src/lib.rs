//! # Comunidad Core
//!
//! Core types, traits, and error definitions shared by every layer of the
//! Comunidad record-management backend: the error taxonomy, backing-store
//! query primitives, entity type tags, and pagination.

pub mod entity;
pub mod error;
pub mod pagination;
pub mod query;
pub mod result;
pub mod telemetry;
pub mod traits;
pub mod validation;

pub use entity::*;
pub use error::*;
pub use pagination::*;
pub use query::*;
pub use result::*;
pub use traits::*;
pub use validation::*;

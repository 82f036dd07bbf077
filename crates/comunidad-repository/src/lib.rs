//! # Comunidad Repository
//!
//! The backing store is the source of truth for every entity. The access
//! layer only talks to it through [`BackingStore`]:
//!
//! ```text
//! BaseService / RelationshipService
//!   ↓  Arc<dyn BackingStore>
//! PgStore                        (PostgreSQL via SQLx)
//! InMemoryStore                  (process-local tables)
//! ```

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryStore;
pub use pool::*;
pub use postgres::PgStore;
pub use traits::*;

//! PostgreSQL backing store.

mod sql;
mod store;

pub use store::PgStore;

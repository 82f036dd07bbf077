//! # Comunidad Config
//!
//! Configuration management for Comunidad.
//! Supports layered configuration from files, environment variables,
//! and runtime refresh.

mod app_config;
mod loader;

pub use app_config::*;
pub use loader::*;

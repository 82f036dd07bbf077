//! Unified error types for all layers of the application.

use serde_json::Value;
use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for all layers of Comunidad.
///
/// Record absence is never an error: lookups return `Ok(None)` so callers can
/// tell "no such record" apart from "failed to determine".
#[derive(Error, Debug)]
pub enum ComunidadError {
    // ============ Caller Errors ============
    /// Input rejected before reaching the backing store.
    #[error("Validation error on '{field}': {message}")]
    Validation {
        field: String,
        value: Value,
        message: String,
    },

    /// Conflict error (e.g., duplicate entry)
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ Infrastructure Errors ============
    /// Backing store operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Cache store operation failed. Absorbed by the cache layer.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Junction table operation failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Junction table already holds the pair
    #[error("Relationship already exists: {source_id} -> {target_id}")]
    RelationshipExists { source_id: String, target_id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComunidadError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Relationship(_) => "RELATIONSHIP_ERROR",
            Self::RelationshipExists { .. } => "RELATIONSHIP_EXISTS",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a validation error for a single field.
    #[must_use]
    pub fn validation<F, M>(field: F, value: impl Into<Value>, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Self::Validation {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Creates a database error.
    #[must_use]
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database(message.into())
    }

    /// Creates a cache error.
    #[must_use]
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for errors raised before any I/O happened.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Checks if this error is retriable.
    ///
    /// Nothing in the access layer retries on its own; this is a hint for
    /// callers that want to.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cache(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for ComunidadError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    return Self::Conflict(db_err.message().to_string());
                }
                Self::Database(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ComunidadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

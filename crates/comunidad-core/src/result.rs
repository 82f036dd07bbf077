//! Result type aliases for Comunidad.

use crate::ComunidadError;

/// A specialized `Result` type for Comunidad operations.
pub type ComunidadResult<T> = Result<T, ComunidadError>;

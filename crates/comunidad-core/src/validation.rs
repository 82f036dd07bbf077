//! Validation utilities.

use crate::ComunidadError;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a `ComunidadError` on failure.
    fn validate_input(&self) -> Result<(), ComunidadError> {
        self.validate().map_err(validation_errors_to_comunidad_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Converts `validator::ValidationErrors` to a single-field `ComunidadError`.
///
/// The alphabetically first failing field wins so the reported error is
/// stable across runs.
#[must_use]
pub fn validation_errors_to_comunidad_error(errors: ValidationErrors) -> ComunidadError {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    let Some((field, errs)) = fields.first() else {
        return ComunidadError::validation("input", Value::Null, "invalid input");
    };
    let Some(first) = errs.first() else {
        return ComunidadError::validation(field.to_string(), Value::Null, "invalid input");
    };

    let message = first
        .message
        .as_ref()
        .map_or_else(|| first.code.to_string(), ToString::to_string);
    let value = first.params.get("value").cloned().unwrap_or(Value::Null);

    ComunidadError::validation(field.to_string(), value, message)
}

/// Common validation functions.
pub mod rules {
    use std::borrow::Cow;
    use validator::ValidationError;

    fn rejected(code: &'static str, message: &'static str, value: &str) -> ValidationError {
        let mut err = ValidationError::new(code).with_message(Cow::Borrowed(message));
        err.add_param(Cow::Borrowed("value"), &value);
        err
    }

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(rejected("not_blank", "must not be blank", value));
        }
        Ok(())
    }

    /// Validates that `value` is one of `allowed`.
    pub fn one_of(value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
        if allowed.contains(&value) {
            return Ok(());
        }
        let mut err = ValidationError::new("one_of")
            .with_message(Cow::Owned(format!("must be one of: {}", allowed.join(", "))));
        err.add_param(Cow::Borrowed("value"), &value);
        Err(err)
    }
}

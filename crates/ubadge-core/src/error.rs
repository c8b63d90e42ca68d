//! # Validation Errors
//!
//! Errors raised when a domain primitive is constructed from untrusted input.

use thiserror::Error;

/// A value failed format validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The string is not a usable email address.
    #[error("invalid email address {value:?}: {reason}")]
    InvalidEmail {
        /// The rejected input.
        value: String,
        /// Which rule the input broke.
        reason: &'static str,
    },

    /// A required text field was empty or whitespace.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Reject empty or whitespace-only text for the named field.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(())
    }
}

//! Field validation error shared by every record type.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Checks that `value` is non-blank and at most `max_chars` characters.
pub fn validate_text_field(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "This field is required."));
    }
    let length = value.chars().count();
    if length > max_chars {
        return Err(ValidationError::new(
            field,
            format!("Ensure this value has at most {max_chars} characters (it has {length})."),
        ));
    }
    Ok(())
}

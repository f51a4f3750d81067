pub mod path;
pub mod serializer;

use std::fmt;

pub use path::{FieldPath, FormError, Index, Segment};
pub use serializer::{add_to_object, serialize, NamedValue};

/// An inline, user-facing problem with one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { field: field.into(), msg: msg.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.msg)
    }
}

impl std::error::Error for FieldError {}

/// Blank-after-trim counts as missing.
pub fn validate_required(field: &str, value: Option<&str>) -> Result<(), FieldError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(FieldError::new(field, "This field is required.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("username", Some("alice")).is_ok());
        let err = validate_required("username", Some("   ")).unwrap_err();
        assert_eq!(err.msg, "This field is required.");
        assert!(validate_required("username", None).is_err());
    }
}

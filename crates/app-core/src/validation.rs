//! Client-side form validation, checked before any network call

use thiserror::Error;

/// Validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty
    #[error("The {0} field is required")]
    EmptyField(&'static str),
}

/// Fail if `value` is empty
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(require("title", "T").is_ok());
        assert_eq!(require("title", ""), Err(ValidationError::EmptyField("title")));
        assert_eq!(
            ValidationError::EmptyField("email").to_string(),
            "The email field is required"
        );
    }
}

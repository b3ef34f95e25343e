//! # Error Module
//!
//! Domain errors for PalmPay using thiserror.

use thiserror::Error;

use crate::state::AttemptState;

/// Core domain errors.
///
/// Pure validation failures; infrastructure errors live in the persistence
/// and service layers.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Biometric data errors ===
    #[error("Invalid feature vector: expected {expected} values, got {actual}")]
    InvalidFeatureLength { expected: usize, actual: usize },

    #[error("Feature vector contains a non-finite value at index {0}")]
    NonFiniteFeature(usize),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    // === State machine errors ===
    #[error("Illegal attempt transition: {from} -> {to}")]
    IllegalTransition { from: AttemptState, to: AttemptState },

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Checks whether this is a biometric sample error
    pub fn is_sample_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidFeatureLength { .. }
                | CoreError::NonFiniteFeature(_)
                | CoreError::InvalidDetection(_)
        )
    }
}

/// Validates a user identifier: non-empty, no surrounding whitespace.
pub fn validate_user_id(user_id: &str) -> CoreResult<()> {
    if user_id.is_empty() || user_id.trim() != user_id {
        return Err(CoreError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidAmount("-5.00".into());
        assert_eq!(err.to_string(), "Invalid amount: -5.00");

        let err = CoreError::InvalidFeatureLength {
            expected: 42,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid feature vector: expected 42 values, got 3"
        );
    }

    #[test]
    fn test_error_checks() {
        assert!(!CoreError::InvalidAmount("0".into()).is_sample_error());
        assert!(CoreError::NonFiniteFeature(4).is_sample_error());
        assert!(!CoreError::UnknownEventKind("x".into()).is_sample_error());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("user_001").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(" user_001").is_err());
    }
}

//! Settlement layer errors
//!
//! Payment attempts never fail with these: every attempt resolves to an
//! `Outcome`. Errors are reserved for enrollment, wallet and history calls,
//! and for invariant breaches inside the coordinator.

use palmpay_core::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    // === Validation errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Image reference must not be empty")]
    EmptyImageRef,

    #[error("Invalid palm sample: {0}")]
    InvalidSample(#[from] palmpay_biometrics::BiometricError),

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(palmpay_persistence::PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Caller input was rejected; nothing was written
    pub fn is_validation_error(&self) -> bool {
        match self {
            Self::InvalidAmount(_)
            | Self::InsufficientBalance { .. }
            | Self::EmptyImageRef
            | Self::InvalidSample(_) => true,
            Self::Core(e) => {
                e.is_sample_error()
                    || matches!(e, CoreError::InvalidUserId(_) | CoreError::InvalidAmount(_))
            }
            Self::Persistence(_) => false,
        }
    }
}

impl From<palmpay_persistence::PersistenceError> for ServiceError {
    fn from(err: palmpay_persistence::PersistenceError) -> Self {
        use palmpay_persistence::PersistenceError;
        match err {
            PersistenceError::InsufficientBalance { needed, available } => {
                Self::insufficient_balance(needed, available)
            }
            other => Self::Persistence(other),
        }
    }
}

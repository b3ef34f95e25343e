//! # Persistence Errors
//!
//! Error types for the persistence layer, wrapping sqlx and row decoding errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // === Conversion errors ===
    #[error("Feature serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("Invalid stored row: {0}")]
    InvalidRow(#[from] palmpay_core::CoreError),

    #[error("Invalid timestamp: {0}ms")]
    InvalidTimestamp(i64),

    // === Store rules ===
    #[error("Ambiguous identity: {count} templates enrolled")]
    AmbiguousIdentity { count: i64 },

    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

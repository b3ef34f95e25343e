//! Biometric pipeline errors

use thiserror::Error;

/// Failures reported by a landmark provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Hardware or model is absent or access was denied. Terminal for the
    /// capture session.
    #[error("Landmark provider unavailable: {0}")]
    Unavailable(String),

    /// A single frame could not be processed. Treated as "no hand".
    #[error("Landmark inference failed: {0}")]
    Inference(String),
}

impl ProviderError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum BiometricError {
    #[error("Invalid sample: {0}")]
    InvalidSample(#[from] palmpay_core::CoreError),

    #[error("Degenerate palm geometry: {0}")]
    DegenerateGeometry(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Detection script IO error: {0}")]
    ScriptIo(#[from] std::io::Error),

    #[error("Detection script parse error: {0}")]
    ScriptParse(#[from] serde_json::Error),
}

pub type BiometricResult<T> = Result<T, BiometricError>;

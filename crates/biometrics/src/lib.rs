//! # PalmPay Biometrics
//!
//! Everything between the camera and a match decision.
//!
//! ```text
//! Frame ─▶ LandmarkProvider ─▶ CaptureSession ══(bounded, drop-latest)══▶ DetectionStream
//!                                                                           │
//!                         StabilityWindow (debounce + liveness) ◀───────────┘
//!                                   │ stable Detection
//!                                   ▼
//!                         features::extract ─▶ MatchEngine::decide ─▶ MatchDecision
//! ```

pub mod capture;
pub mod error;
pub mod features;
pub mod matcher;
pub mod provider;
pub mod stability;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureSession, CaptureStats, DetectionSender, DetectionStream};
pub use error::{BiometricError, BiometricResult, ProviderError};
pub use features::extract;
pub use matcher::{MatchDecision, MatchEngine, MatcherConfig, ThresholdMatcher};
pub use provider::{LandmarkProvider, ScriptedProvider};
pub use stability::{StabilityConfig, StabilityVerdict, StabilityWindow};

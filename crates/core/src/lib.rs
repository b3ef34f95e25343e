//! # PalmPay Core
//!
//! Domain types shared by every PalmPay crate:
//!
//! - [`Money`] / [`Currency`]: exact monetary amounts on `rust_decimal`
//! - [`EnrolledTemplate`] / [`FeatureVector`]: the stored biometric reference
//! - [`ScanEvent`] / [`EventKind`]: append-only ledger entries
//! - [`Detection`] / [`Frame`]: the landmark provider output contract
//! - [`AttemptState`]: the per-attempt payment state machine
//! - [`Outcome`] / [`PaymentOutcome`]: what a payment attempt reports back

pub mod detection;
pub mod error;
pub mod event;
pub mod money;
pub mod outcome;
pub mod state;
pub mod template;

pub use detection::{BoundingBox, Detection, Frame, Keypoint, HAND_KEYPOINTS};
pub use error::{validate_user_id, CoreError, CoreResult};
pub use event::{EventKind, NewScanEvent, ScanEvent};
pub use money::{Currency, Money};
pub use outcome::{Outcome, PaymentOutcome, PaymentRequest};
pub use state::AttemptState;
pub use template::{EnrolledTemplate, FeatureVector, FEATURE_LEN};

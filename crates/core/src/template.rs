//! # Template Module
//!
//! The enrolled biometric reference for a user and its numeric feature
//! representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::HAND_KEYPOINTS;
use crate::error::{CoreError, CoreResult};

/// Length of a palm feature vector: one (x, y) pair per hand keypoint.
pub const FEATURE_LEN: usize = HAND_KEYPOINTS * 2;

/// Fixed-size numeric palm descriptor.
///
/// Construction enforces the length and rejects NaN/infinite values, so a
/// `FeatureVector` in hand is always comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> CoreResult<Self> {
        if values.len() != FEATURE_LEN {
            return Err(CoreError::InvalidFeatureLength {
                expected: FEATURE_LEN,
                actual: values.len(),
            });
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(CoreError::NonFiniteFeature(i));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Root mean square distance to another vector
    pub fn rms_distance(&self, other: &FeatureVector) -> f32 {
        let sum: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        (sum / FEATURE_LEN as f32).sqrt()
    }

    /// Serialized form stored in the template table
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = CoreError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(v: FeatureVector) -> Self {
        v.0
    }
}

/// The live biometric template of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledTemplate {
    pub user_id: String,
    /// Opaque reference to the captured image (path or URI), never the bytes
    pub image_ref: String,
    pub features: FeatureVector,
    pub enrolled_at: DateTime<Utc>,
    /// Bumped each time the template is replaced with different data
    pub version: u32,
}

impl EnrolledTemplate {
    /// Whether re-enrolling with these inputs would change anything
    pub fn same_inputs(&self, image_ref: &str, features: &FeatureVector) -> bool {
        self.image_ref == image_ref && &self.features == features
    }
}

//! Match engine.
//!
//! A decision is a similarity score against a threshold. The score is
//! `1 / (1 + rms)` where `rms` is the root mean square distance between the
//! live feature vector and the template, both in palm-span units. Identical
//! geometry scores 1.0; the score falls towards 0 as the shapes diverge.

use palmpay_core::{EnrolledTemplate, FeatureVector};
use serde::{Deserialize, Serialize};

/// Default acceptance threshold (rms distance of about 0.11 palm spans)
pub const DEFAULT_THRESHOLD: f32 = 0.90;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum similarity in `(0, 1]` required to accept
    pub threshold: f32,
}

impl MatcherConfig {
    /// A threshold of zero accepts every sample, so it is not a valid setting
    pub fn is_valid_threshold(threshold: f32) -> bool {
        threshold > 0.0 && threshold <= 1.0
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchDecision {
    Accept { score: f32 },
    Reject { score: f32 },
}

impl MatchDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, MatchDecision::Accept { .. })
    }

    pub fn score(&self) -> f32 {
        match self {
            MatchDecision::Accept { score } | MatchDecision::Reject { score } => *score,
        }
    }
}

/// Decides whether a live sample belongs to the owner of a template.
pub trait MatchEngine: Send + Sync {
    fn decide(&self, live: &FeatureVector, template: &EnrolledTemplate) -> MatchDecision;
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdMatcher {
    config: MatcherConfig,
}

impl ThresholdMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub fn similarity(live: &FeatureVector, reference: &FeatureVector) -> f32 {
        1.0 / (1.0 + live.rms_distance(reference))
    }
}

impl MatchEngine for ThresholdMatcher {
    fn decide(&self, live: &FeatureVector, template: &EnrolledTemplate) -> MatchDecision {
        let score = Self::similarity(live, &template.features);
        if score >= self.config.threshold {
            MatchDecision::Accept { score }
        } else {
            MatchDecision::Reject { score }
        }
    }
}

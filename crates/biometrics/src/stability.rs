//! Detection debouncing and a motion-based liveness window.
//!
//! A payment may only start from a hand that has been seen in `window`
//! consecutive frames without wandering across the frame. Within that window
//! the keypoints must also move a little: a perfectly still hand is what a
//! printed photo or a replayed screenshot looks like.

use std::collections::VecDeque;

use palmpay_core::Detection;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Consecutive detections required
    pub window: usize,
    /// Max distance of any bounding box centre from the first in the window
    pub max_center_drift: f32,
    /// Mean per-frame keypoint motion below this is treated as a static image
    pub min_motion: f32,
    /// Mean per-frame keypoint motion above this is treated as an unsteady hand
    pub max_motion: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window: 3,
            max_center_drift: 0.05,
            min_motion: 0.0005,
            max_motion: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StabilityVerdict {
    /// Window satisfied; carries the newest detection as the live sample
    Stable(Detection),
    Collecting { have: usize, need: usize },
    NoHand,
    /// Hand moved too much; window restarted from the newest frame
    Unstable,
    /// Hand too still to be live
    Static,
}

#[derive(Debug)]
pub struct StabilityWindow {
    config: StabilityConfig,
    frames: VecDeque<Detection>,
}

impl StabilityWindow {
    pub fn new(config: StabilityConfig) -> Self {
        let window = config.window.max(1);
        Self {
            config: StabilityConfig { window, ..config },
            frames: VecDeque::with_capacity(window),
        }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    pub fn push(&mut self, detection: Option<Detection>) -> StabilityVerdict {
        let Some(detection) = detection.filter(|d| d.validate().is_ok()) else {
            self.frames.clear();
            return StabilityVerdict::NoHand;
        };

        self.frames.push_back(detection);
        while self.frames.len() > self.config.window {
            self.frames.pop_front();
        }
        if self.frames.len() < self.config.window {
            return StabilityVerdict::Collecting {
                have: self.frames.len(),
                need: self.config.window,
            };
        }

        let drift = self.center_drift();
        let motion = self.mean_motion();
        trace!(drift, ?motion, "stability window full");

        if drift > self.config.max_center_drift
            || motion.is_some_and(|m| m > self.config.max_motion)
        {
            self.restart_from_newest();
            return StabilityVerdict::Unstable;
        }
        if motion.is_some_and(|m| m < self.config.min_motion) {
            return StabilityVerdict::Static;
        }

        let sample = self.frames.back().cloned();
        self.frames.clear();
        match sample {
            Some(d) => StabilityVerdict::Stable(d),
            None => StabilityVerdict::NoHand,
        }
    }

    fn restart_from_newest(&mut self) {
        if let Some(last) = self.frames.pop_back() {
            self.frames.clear();
            self.frames.push_back(last);
        }
    }

    fn center_drift(&self) -> f32 {
        let Some(first) = self.frames.front() else {
            return 0.0;
        };
        let origin = first.bounding_box.center();
        self.frames
            .iter()
            .map(|d| d.bounding_box.center().distance(&origin))
            .fold(0.0, f32::max)
    }

    /// Mean keypoint displacement between consecutive frames, `None` with
    /// fewer than two frames
    fn mean_motion(&self) -> Option<f32> {
        if self.frames.len() < 2 {
            return None;
        }
        let pairs = self.frames.iter().zip(self.frames.iter().skip(1));
        let mut total = 0.0;
        let mut count = 0usize;
        for (a, b) in pairs {
            let per_frame: f32 = a
                .keypoints
                .iter()
                .zip(b.keypoints.iter())
                .map(|(p, q)| p.distance(q))
                .sum::<f32>()
                / a.keypoints.len() as f32;
            total += per_frame;
            count += 1;
        }
        Some(total / count as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{detection, open_hand, open_hand_points, transformed, trembling_open_hand};

    #[test]
    fn test_stable_after_window() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        assert_eq!(
            window.push(Some(trembling_open_hand(0))),
            StabilityVerdict::Collecting { have: 1, need: 3 }
        );
        assert_eq!(
            window.push(Some(trembling_open_hand(1))),
            StabilityVerdict::Collecting { have: 2, need: 3 }
        );
        assert!(matches!(
            window.push(Some(trembling_open_hand(2))),
            StabilityVerdict::Stable(_)
        ));
        // Window restarts after a stable verdict
        assert!(matches!(
            window.push(Some(trembling_open_hand(3))),
            StabilityVerdict::Collecting { have: 1, .. }
        ));
    }

    #[test]
    fn test_missing_hand_resets_window() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        window.push(Some(trembling_open_hand(0)));
        window.push(Some(trembling_open_hand(1)));
        assert_eq!(window.push(None), StabilityVerdict::NoHand);
        assert!(matches!(
            window.push(Some(trembling_open_hand(2))),
            StabilityVerdict::Collecting { have: 1, .. }
        ));
    }

    #[test]
    fn test_static_image_is_not_live() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        window.push(Some(open_hand()));
        window.push(Some(open_hand()));
        assert_eq!(window.push(Some(open_hand())), StabilityVerdict::Static);
    }

    #[test]
    fn test_moving_hand_is_unstable() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        let points = open_hand_points();
        window.push(Some(detection(transformed(&points, 1.0, 0.0, 0.0, 0.0))));
        window.push(Some(detection(transformed(&points, 1.0, 0.0, 0.06, 0.0))));
        assert_eq!(
            window.push(Some(detection(transformed(&points, 1.0, 0.0, 0.12, 0.0)))),
            StabilityVerdict::Unstable
        );
    }

    #[test]
    fn test_liveness_disabled_with_zero_min_motion() {
        let mut window = StabilityWindow::new(StabilityConfig {
            window: 2,
            min_motion: 0.0,
            ..StabilityConfig::default()
        });
        window.push(Some(open_hand()));
        assert!(matches!(
            window.push(Some(open_hand())),
            StabilityVerdict::Stable(_)
        ));
    }

    #[test]
    fn test_invalid_detection_counts_as_no_hand() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        let mut broken = open_hand();
        broken.keypoints.truncate(4);
        assert_eq!(window.push(Some(broken)), StabilityVerdict::NoHand);
    }

    #[test]
    fn test_nan_bounding_box_never_stabilises() {
        let mut window = StabilityWindow::new(StabilityConfig::default());
        for frame in 0..6 {
            let mut det = trembling_open_hand(frame);
            det.bounding_box.min_x = f32::NAN;
            assert_eq!(window.push(Some(det)), StabilityVerdict::NoHand);
        }
    }
}

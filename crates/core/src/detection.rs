//! # Detection Module
//!
//! Output contract of the external hand-landmark provider, plus the camera
//! frame it consumes. The provider itself lives behind a trait in
//! `palmpay-biometrics`; this crate only describes the data.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Number of keypoints produced per hand (wrist + 4 per finger).
pub const HAND_KEYPOINTS: usize = 21;

/// Index of the wrist keypoint.
pub const WRIST: usize = 0;
/// Index of the middle finger MCP joint (base of the middle finger).
pub const MIDDLE_MCP: usize = 9;

/// A camera frame handed to the landmark provider.
///
/// The core never persists pixels; frames only live inside the capture
/// pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation needed to display the frame upright
    pub rotation_degrees: u16,
    pub pixels: Vec<u8>,
    pub timestamp_ms: i64,
}

impl Frame {
    /// Frame with no pixel payload, used by scripted providers and tests
    pub fn blank(width: u32, height: u32, timestamp_ms: i64) -> Self {
        Self {
            width,
            height,
            rotation_degrees: 0,
            pixels: Vec::new(),
            timestamp_ms,
        }
    }
}

/// A normalized keypoint, coordinates in `[0, 1]` relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Finite and inside `[0, 1]` on both axes. NaN fails the range check.
    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    pub fn distance(&self, other: &Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box around the hand in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn center(&self) -> Keypoint {
        Keypoint::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Normalized corners with `min <= max` on both axes
    pub fn is_valid(&self) -> bool {
        let corners = [
            Keypoint::new(self.min_x, self.min_y),
            Keypoint::new(self.max_x, self.max_y),
        ];
        corners.iter().all(Keypoint::is_normalized)
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Smallest box containing every keypoint
    pub fn enclosing(points: &[Keypoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }
}

/// One detected hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub keypoints: Vec<Keypoint>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Detection {
    /// Builds a detection from keypoints, deriving the bounding box the same
    /// way the landmark provider does (min/max over the keypoints).
    pub fn from_keypoints(
        keypoints: Vec<Keypoint>,
        frame_width: u32,
        frame_height: u32,
    ) -> CoreResult<Self> {
        let bounding_box = BoundingBox::enclosing(&keypoints)
            .ok_or_else(|| CoreError::InvalidDetection("no keypoints".to_string()))?;
        let detection = Self {
            bounding_box,
            keypoints,
            frame_width,
            frame_height,
        };
        detection.validate()?;
        Ok(detection)
    }

    /// Checks the structural contract: 21 keypoints and a bounding box, all
    /// finite and inside the normalized `[0, 1]` range
    pub fn validate(&self) -> CoreResult<()> {
        if self.keypoints.len() != HAND_KEYPOINTS {
            return Err(CoreError::InvalidDetection(format!(
                "expected {} keypoints, got {}",
                HAND_KEYPOINTS,
                self.keypoints.len()
            )));
        }
        if let Some(i) = self.keypoints.iter().position(|p| !p.is_normalized()) {
            return Err(CoreError::InvalidDetection(format!(
                "keypoint {} is outside [0, 1]",
                i
            )));
        }
        if !self.bounding_box.is_valid() {
            return Err(CoreError::InvalidDetection(format!(
                "bounding box {:?} is not a normalized rectangle",
                self.bounding_box
            )));
        }
        Ok(())
    }

    /// Keypoint coordinates in pixels of the source frame
    pub fn pixel_keypoints(&self) -> Vec<(f32, f32)> {
        self.keypoints
            .iter()
            .map(|p| {
                (
                    p.x * self.frame_width as f32,
                    p.y * self.frame_height as f32,
                )
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// An open right hand, roughly centred in the frame
    pub fn open_hand() -> Vec<Keypoint> {
        let raw: [(f32, f32); HAND_KEYPOINTS] = [
            (0.50, 0.80),
            (0.42, 0.74), (0.37, 0.67), (0.34, 0.61), (0.31, 0.56),
            (0.45, 0.58), (0.44, 0.49), (0.44, 0.43), (0.44, 0.38),
            (0.50, 0.57), (0.50, 0.47), (0.50, 0.41), (0.50, 0.36),
            (0.55, 0.58), (0.56, 0.49), (0.56, 0.44), (0.57, 0.39),
            (0.60, 0.61), (0.62, 0.54), (0.63, 0.50), (0.64, 0.46),
        ];
        raw.iter().map(|&(x, y)| Keypoint::new(x, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::open_hand;
    use super::*;

    #[test]
    fn test_from_keypoints_derives_bbox() {
        let det = Detection::from_keypoints(open_hand(), 640, 480).unwrap();
        assert_eq!(det.bounding_box.min_x, 0.31);
        assert_eq!(det.bounding_box.max_y, 0.80);
        assert_eq!(det.bounding_box.min_y, 0.36);
        assert!(det.bounding_box.width() > 0.0);
    }

    #[test]
    fn test_wrong_keypoint_count_rejected() {
        let mut points = open_hand();
        points.truncate(5);
        let err = Detection::from_keypoints(points, 640, 480).unwrap_err();
        assert!(err.is_sample_error());
    }

    #[test]
    fn test_non_finite_keypoint_rejected() {
        let mut points = open_hand();
        points[3].x = f32::NAN;
        assert!(Detection::from_keypoints(points, 640, 480).is_err());
    }

    #[test]
    fn test_out_of_range_keypoint_rejected() {
        let mut points = open_hand();
        points[7].y = 1.2;
        let err = Detection::from_keypoints(points, 640, 480).unwrap_err();
        assert_eq!(err.to_string(), "Invalid detection: keypoint 7 is outside [0, 1]");
    }

    #[test]
    fn test_non_finite_bounding_box_rejected() {
        let mut det = Detection::from_keypoints(open_hand(), 640, 480).unwrap();
        det.bounding_box.max_x = f32::NAN;
        assert!(det.validate().unwrap_err().is_sample_error());

        let mut det = Detection::from_keypoints(open_hand(), 640, 480).unwrap();
        det.bounding_box.min_y = 0.9;
        assert!(det.validate().is_err());
    }

    #[test]
    fn test_pixel_keypoints() {
        let det = Detection::from_keypoints(open_hand(), 100, 200).unwrap();
        let px = det.pixel_keypoints();
        assert_eq!(px.len(), HAND_KEYPOINTS);
        assert!((px[0].0 - 50.0).abs() < 1e-4);
        assert!((px[0].1 - 160.0).abs() < 1e-4);
    }

    #[test]
    fn test_detection_json_shape() {
        let det = Detection::from_keypoints(open_hand(), 640, 480).unwrap();
        let json = serde_json::to_string(&det).unwrap();
        assert!(json.contains("bounding_box"));
        assert!(json.contains("frame_width"));
    }
}

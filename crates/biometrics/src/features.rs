//! Palm feature extraction.
//!
//! Keypoints are taken to pixel space (so non-square frames keep their
//! geometry), translated so the wrist is the origin, then rotated and scaled
//! so the wrist-to-middle-MCP axis becomes the unit x vector. The result is
//! invariant to where the hand sits in the frame, how far it is from the
//! camera and its in-plane rotation.

use palmpay_core::detection::{MIDDLE_MCP, WRIST};
use palmpay_core::{Detection, FeatureVector, FEATURE_LEN};

use crate::error::{BiometricError, BiometricResult};

/// Palm axis shorter than this many pixels is treated as noise
const MIN_PALM_SPAN_PX: f32 = 1.0;

pub fn extract(detection: &Detection) -> BiometricResult<FeatureVector> {
    detection.validate()?;

    let points = detection.pixel_keypoints();
    let (ox, oy) = points[WRIST];
    let (ax, ay) = (points[MIDDLE_MCP].0 - ox, points[MIDDLE_MCP].1 - oy);
    let span = (ax * ax + ay * ay).sqrt();
    if !span.is_finite() || span < MIN_PALM_SPAN_PX {
        return Err(BiometricError::DegenerateGeometry(format!(
            "palm span {:.3}px",
            span
        )));
    }

    let (cos, sin) = (ax / span, ay / span);
    let mut values = Vec::with_capacity(FEATURE_LEN);
    for &(px, py) in &points {
        let (dx, dy) = (px - ox, py - oy);
        values.push((dx * cos + dy * sin) / span);
        values.push((dy * cos - dx * sin) / span);
    }

    Ok(FeatureVector::new(values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{detection, open_hand, open_hand_points, transformed};
    use palmpay_core::Keypoint;

    #[test]
    fn test_axis_is_normalized() {
        let features = extract(&open_hand()).unwrap();
        let v = features.as_slice();
        // Wrist at origin
        assert!(v[0].abs() < 1e-6 && v[1].abs() < 1e-6);
        // Middle MCP at (1, 0)
        assert!((v[2 * MIDDLE_MCP] - 1.0).abs() < 1e-5);
        assert!(v[2 * MIDDLE_MCP + 1].abs() < 1e-5);
    }

    #[test]
    fn test_invariant_to_pose() {
        let base = extract(&open_hand()).unwrap();
        let moved = detection(transformed(&open_hand_points(), 0.7, 0.6, 0.05, -0.03));
        let moved = extract(&moved).unwrap();
        assert!(base.rms_distance(&moved) < 1e-3);
    }

    #[test]
    fn test_non_square_frame_uses_pixels() {
        let base = extract(&open_hand()).unwrap();
        // Same physical hand seen by a 960x480 sensor: x coordinates halve
        let squeezed: Vec<Keypoint> = open_hand_points()
            .iter()
            .map(|p| Keypoint::new(p.x / 2.0, p.y))
            .collect();
        let wide = Detection::from_keypoints(squeezed, 960, 480).unwrap();
        assert!(base.rms_distance(&extract(&wide).unwrap()) < 1e-3);
    }

    #[test]
    fn test_degenerate_palm_rejected() {
        let points = vec![Keypoint::new(0.5, 0.5); 21];
        let det = Detection::from_keypoints(points, 480, 480).unwrap();
        assert!(matches!(
            extract(&det),
            Err(BiometricError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_wrong_keypoint_count_rejected() {
        let mut det = open_hand();
        det.keypoints.pop();
        assert!(matches!(extract(&det), Err(BiometricError::InvalidSample(_))));
    }
}

//! Hand fixtures shared by the unit tests of this crate.

use palmpay_core::{Detection, Keypoint};

const OPEN_HAND: [(f32, f32); 21] = [
    (0.50, 0.80),
    (0.42, 0.74), (0.37, 0.67), (0.34, 0.61), (0.31, 0.56),
    (0.45, 0.58), (0.44, 0.49), (0.44, 0.43), (0.44, 0.38),
    (0.50, 0.57), (0.50, 0.47), (0.50, 0.41), (0.50, 0.36),
    (0.55, 0.58), (0.56, 0.49), (0.56, 0.44), (0.57, 0.39),
    (0.60, 0.61), (0.62, 0.54), (0.63, 0.50), (0.64, 0.46),
];

// Fingers curled back towards the palm centre
const FIST: [(f32, f32); 21] = [
    (0.50, 0.80),
    (0.42, 0.74), (0.39, 0.68), (0.42, 0.64), (0.46, 0.63),
    (0.45, 0.58), (0.45, 0.53), (0.46, 0.58), (0.46, 0.62),
    (0.50, 0.57), (0.50, 0.52), (0.50, 0.57), (0.50, 0.61),
    (0.55, 0.58), (0.55, 0.53), (0.54, 0.58), (0.54, 0.62),
    (0.60, 0.61), (0.59, 0.57), (0.58, 0.61), (0.57, 0.64),
];

pub fn open_hand_points() -> Vec<Keypoint> {
    OPEN_HAND.iter().map(|&(x, y)| Keypoint::new(x, y)).collect()
}

pub fn fist_points() -> Vec<Keypoint> {
    FIST.iter().map(|&(x, y)| Keypoint::new(x, y)).collect()
}

/// Square frame so normalized and pixel geometry agree
pub fn detection(points: Vec<Keypoint>) -> Detection {
    Detection::from_keypoints(points, 480, 480).unwrap()
}

pub fn open_hand() -> Detection {
    detection(open_hand_points())
}

pub fn fist() -> Detection {
    detection(fist_points())
}

/// Rotates by `angle` radians around (0.5, 0.5), scales, then shifts
pub fn transformed(points: &[Keypoint], scale: f32, angle: f32, dx: f32, dy: f32) -> Vec<Keypoint> {
    let (s, c) = angle.sin_cos();
    points
        .iter()
        .map(|p| {
            let x = p.x - 0.5;
            let y = p.y - 0.5;
            Keypoint::new(
                (x * c - y * s) * scale + 0.5 + dx,
                (x * s + y * c) * scale + 0.5 + dy,
            )
        })
        .collect()
}

/// Open hand with a small per-frame tremor
pub fn trembling_open_hand(frame: usize) -> Detection {
    let offset = if frame % 2 == 0 { 0.002 } else { -0.002 };
    detection(transformed(&open_hand_points(), 1.0, 0.0, offset, offset))
}

//! Palm enrollment: enroll, unenroll

use anyhow::{Context, Result};
use palmpay_core::Detection;
use std::path::Path;

use crate::commands;
use crate::config::AppConfig;

/// Load a single detection (landmark provider output) from a JSON file
pub fn load_detection(path: &Path) -> Result<Detection> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read landmarks from {:?}", path))?;
    let detection: Detection =
        serde_json::from_str(&raw).with_context(|| format!("Invalid landmarks in {:?}", path))?;
    Ok(detection)
}

pub async fn enroll(config: &AppConfig, image_ref: &str, landmarks: &Path) -> Result<()> {
    let detection = load_detection(landmarks)?;
    let palmpay = commands::open(config).await?;

    let result = palmpay
        .start_enrollment(&config.user_id, image_ref, &detection)
        .await
        .context("Enrollment failed")?;

    if result.changed {
        println!("✅ Palm enrolled!");
    } else {
        println!("ℹ️  Palm already enrolled with the same sample");
    }
    println!("   User:    {}", result.template.user_id);
    println!("   Image:   {}", result.template.image_ref);
    println!("   Version: {}", result.template.version);
    println!("   At:      {}", result.template.enrolled_at.format("%Y-%m-%d %H:%M:%S"));

    palmpay.context().db().close().await;
    Ok(())
}

pub async fn unenroll(config: &AppConfig) -> Result<()> {
    let palmpay = commands::open(config).await?;
    if palmpay.remove_enrollment(&config.user_id).await? {
        println!("🗑️  Removed palm template for {}", config.user_id);
    } else {
        println!("❌ No palm enrolled for {}", config.user_id);
    }
    palmpay.context().db().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use palmpay_core::Keypoint;
    use std::io::Write;

    #[test]
    fn test_load_detection() {
        let points = (0..21)
            .map(|i| Keypoint::new(0.3 + i as f32 * 0.01, 0.8 - i as f32 * 0.02))
            .collect();
        let detection = Detection::from_keypoints(points, 640, 480).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&detection).unwrap()).unwrap();
        assert_eq!(load_detection(file.path()).unwrap(), detection);
    }

    #[test]
    fn test_load_detection_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_detection(file.path()).is_err());
    }
}

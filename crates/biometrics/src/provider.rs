//! Landmark provider boundary.
//!
//! Hand-landmark inference is an external capability. The core only sees
//! this trait: a frame goes in, zero or one [`Detection`] comes out.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use palmpay_core::{Detection, Frame};
use tracing::debug;

use crate::error::{BiometricResult, ProviderError};

pub trait LandmarkProvider: Send + 'static {
    /// Checked once when a capture session starts
    fn ready(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Returns the most prominent hand in `frame`, if any
    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, ProviderError>;

    /// Frees the model / camera. Called exactly once by the capture session.
    fn release(&mut self) {}
}

/// Replays a fixed sequence of detections, one per frame.
///
/// Stands in for an on-device model in the CLI and in tests. Once the script
/// is exhausted every further frame yields no hand.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Vec<Option<Detection>>,
    cursor: usize,
    unavailable: Option<String>,
    released: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Option<Detection>>) -> Self {
        Self {
            script,
            cursor: 0,
            unavailable: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Loads a JSON array of `Detection | null`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> BiometricResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let script: Vec<Option<Detection>> = serde_json::from_str(&raw)?;
        debug!(path = %path.as_ref().display(), frames = script.len(), "loaded detection script");
        Ok(Self::new(script))
    }

    /// A provider whose hardware is missing; `ready` fails
    pub fn unavailable(reason: &str) -> Self {
        Self {
            unavailable: Some(reason.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Flag set once `release` has run
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn ready(&self) -> Result<(), ProviderError> {
        match &self.unavailable {
            Some(reason) => Err(ProviderError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Option<Detection>, ProviderError> {
        self.ready()?;
        let detection = self.script.get(self.cursor).cloned().flatten();
        self.cursor += 1;
        Ok(detection)
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

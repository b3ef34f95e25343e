//! Configuration: environment first, command-line flags on top

use palmpay_biometrics::{MatcherConfig, StabilityConfig};
use palmpay_settlement::{SettlementConfig, DEFAULT_COUNTERPARTY};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub user_id: String,
    pub match_threshold: f32,
    pub stable_frames: usize,
    pub processing_delay_ms: u64,
    pub counterparty: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/palmpay.db"),
            user_id: "user_001".to_string(),
            match_threshold: MatcherConfig::default().threshold,
            stable_frames: StabilityConfig::default().window,
            processing_delay_ms: 500,
            counterparty: DEFAULT_COUNTERPARTY.to_string(),
        }
    }
}

/// Parses a `--threshold` flag; zero and values outside `(0, 1]` are refused
pub fn parse_threshold(raw: &str) -> Result<f32, String> {
    let threshold: f32 = raw
        .parse()
        .map_err(|_| format!("{:?} is not a number", raw))?;
    if !MatcherConfig::is_valid_threshold(threshold) {
        return Err(format!("threshold must be in (0, 1], got {}", raw));
    }
    Ok(threshold)
}

/// Flag values that override the environment when present
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub user_id: Option<String>,
    pub match_threshold: Option<f32>,
    pub stable_frames: Option<usize>,
    pub processing_delay_ms: Option<u64>,
}

impl AppConfig {
    /// Load config from PALMPAY_* environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable source. Unparsable values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            db_path: lookup("PALMPAY_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            user_id: lookup("PALMPAY_USER").unwrap_or(defaults.user_id),
            match_threshold: lookup("PALMPAY_MATCH_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .filter(|t: &f32| MatcherConfig::is_valid_threshold(*t))
                .unwrap_or(defaults.match_threshold),
            stable_frames: lookup("PALMPAY_STABLE_FRAMES")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.stable_frames),
            processing_delay_ms: lookup("PALMPAY_PROCESSING_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.processing_delay_ms),
            counterparty: lookup("PALMPAY_COUNTERPARTY").unwrap_or(defaults.counterparty),
        }
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(db_path) = overrides.db_path {
            self.db_path = db_path;
        }
        if let Some(user_id) = overrides.user_id {
            self.user_id = user_id;
        }
        if let Some(threshold) = overrides
            .match_threshold
            .filter(|t| MatcherConfig::is_valid_threshold(*t))
        {
            self.match_threshold = threshold;
        }
        if let Some(frames) = overrides.stable_frames {
            self.stable_frames = frames;
        }
        if let Some(delay) = overrides.processing_delay_ms {
            self.processing_delay_ms = delay;
        }
        self
    }

    pub fn matcher(&self) -> MatcherConfig {
        MatcherConfig {
            threshold: self.match_threshold,
        }
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            processing_delay: Duration::from_millis(self.processing_delay_ms),
            default_counterparty: self.counterparty.clone(),
            stability: StabilityConfig {
                window: self.stable_frames,
                ..StabilityConfig::default()
            },
            ..SettlementConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.stable_frames, 3);
        assert_eq!(config.match_threshold, 0.90);
        assert_eq!(config.settlement().processing_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PALMPAY_DB", "/tmp/p.db"),
            ("PALMPAY_MATCH_THRESHOLD", "0.95"),
            ("PALMPAY_STABLE_FRAMES", "0"),
            ("PALMPAY_PROCESSING_DELAY_MS", "fast"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.db_path, PathBuf::from("/tmp/p.db"));
        assert_eq!(config.match_threshold, 0.95);
        // Invalid values fall back
        assert_eq!(config.stable_frames, 3);
        assert_eq!(config.processing_delay_ms, 500);
    }

    #[test]
    fn test_threshold_must_be_positive() {
        assert_eq!(parse_threshold("0.95"), Ok(0.95));
        assert!(parse_threshold("0").is_err());
        assert!(parse_threshold("1.5").is_err());
        assert!(parse_threshold("NaN").is_err());
        assert!(parse_threshold("high").is_err());

        let vars: HashMap<&str, &str> = HashMap::from([("PALMPAY_MATCH_THRESHOLD", "0")]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).apply(
            Overrides {
                match_threshold: Some(0.0),
                ..Overrides::default()
            },
        );
        assert_eq!(config.match_threshold, 0.90);
    }

    #[test]
    fn test_flags_override_env() {
        let config = AppConfig::from_lookup(|_| None).apply(Overrides {
            stable_frames: Some(5),
            processing_delay_ms: Some(0),
            ..Overrides::default()
        });
        assert_eq!(config.settlement().stability.window, 5);
        assert_eq!(config.settlement().processing_delay, Duration::ZERO);
    }
}

//! Subcommand handlers

pub mod enroll;
pub mod history;
pub mod pay;
pub mod wallet;

use crate::config::AppConfig;
use crate::db;
use anyhow::Result;
use palmpay_biometrics::ThresholdMatcher;
use palmpay_settlement::PalmPay;
use std::sync::Arc;

/// Open the configured database behind the service facade
pub async fn open(config: &AppConfig) -> Result<PalmPay> {
    let db = db::open(&config.db_path).await?;
    Ok(PalmPay::with_matcher(
        db,
        config.settlement(),
        Arc::new(ThresholdMatcher::new(config.matcher())),
    ))
}

//! Database schema definitions
//!
//! Row types for sqlx mapping from the SQLite tables, and the schema itself.
//! Timestamps are stored as UTC milliseconds so ordering is numeric; money is
//! stored as TEXT so it stays exact.

use chrono::{DateTime, Utc};
use palmpay_core::{EnrolledTemplate, EventKind, FeatureVector, ScanEvent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::{PersistenceError, PersistenceResult};

/// Row type for the `enrolled_templates` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TemplateRow {
    pub user_id: String,
    pub image_ref: String,
    pub features: String, // JSON array of f32
    pub enrolled_at_ms: i64,
    pub version: i64,
}

/// Row type for the `scan_events` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ScanEventRow {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub timestamp_ms: i64,
    pub image_ref: Option<String>,
    pub counterparty: Option<String>,
    pub amount: String, // Decimal stored as TEXT
    pub note: Option<String>,
}

/// Row type for the single-row `wallet` table
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: i64,
    pub balance: String, // Decimal stored as TEXT
    pub updated_at_ms: i64,
}

/// Create tables and indexes if they do not exist yet
pub async fn create_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::query(
        r#"
        -- One live template per user
        CREATE TABLE IF NOT EXISTS enrolled_templates (
            user_id TEXT PRIMARY KEY,
            image_ref TEXT NOT NULL,
            features TEXT NOT NULL,
            enrolled_at_ms INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        -- Append-only ledger
        CREATE TABLE IF NOT EXISTS scan_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            image_ref TEXT,
            counterparty TEXT,
            amount TEXT NOT NULL DEFAULT '0',
            note TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_scan_events_timeline
            ON scan_events(timestamp_ms DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_scan_events_user
            ON scan_events(user_id, timestamp_ms);

        -- Single wallet balance
        CREATE TABLE IF NOT EXISTS wallet (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            balance TEXT NOT NULL DEFAULT '0',
            updated_at_ms INTEGER NOT NULL DEFAULT 0
        );

        INSERT OR IGNORE INTO wallet (id, balance, updated_at_ms) VALUES (1, '0', 0);
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

// === Conversion implementations ===

pub(crate) fn parse_decimal(raw: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| PersistenceError::InvalidDecimal(format!("{}: {}", raw, e)))
}

pub(crate) fn from_millis(ms: i64) -> PersistenceResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(PersistenceError::InvalidTimestamp(ms))
}

impl TryFrom<TemplateRow> for EnrolledTemplate {
    type Error = PersistenceError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            features: FeatureVector::from_json(&row.features)?,
            enrolled_at: from_millis(row.enrolled_at_ms)?,
            version: u32::try_from(row.version).unwrap_or(u32::MAX),
            user_id: row.user_id,
            image_ref: row.image_ref,
        })
    }
}

impl TryFrom<ScanEventRow> for ScanEvent {
    type Error = PersistenceError;

    fn try_from(row: ScanEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            kind: EventKind::from_str(&row.kind)?,
            timestamp: from_millis(row.timestamp_ms)?,
            amount: parse_decimal(&row.amount)?,
            user_id: row.user_id,
            image_ref: row.image_ref,
            counterparty: row.counterparty,
            note: row.note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_row_conversion() {
        let row = ScanEventRow {
            id: 7,
            user_id: "user_001".to_string(),
            kind: "payment_success".to_string(),
            timestamp_ms: 1_700_000_000_123,
            image_ref: None,
            counterparty: Some("Kiran Kirana Store".to_string()),
            amount: "150.00".to_string(),
            note: None,
        };
        let event = ScanEvent::try_from(row).unwrap();
        assert_eq!(event.kind, EventKind::PaymentSuccess);
        assert_eq!(event.amount.to_string(), "150.00");
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_bad_rows_rejected() {
        let row = ScanEventRow {
            id: 1,
            user_id: "u".to_string(),
            kind: "refund".to_string(),
            timestamp_ms: 0,
            image_ref: None,
            counterparty: None,
            amount: "0".to_string(),
            note: None,
        };
        assert!(matches!(
            ScanEvent::try_from(row),
            Err(PersistenceError::InvalidRow(_))
        ));
        assert!(parse_decimal("12,50").is_err());
    }
}

//! Repository implementations for SQLite
//!
//! Read paths take the pool. Write paths that must commit together with other
//! writes also come in an `_in` form taking a connection, so callers can run
//! them inside one transaction.

use chrono::Utc;
use palmpay_core::{EnrolledTemplate, EventKind, FeatureVector, NewScanEvent, ScanEvent};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;

// ============================================================================
// Template Repository
// ============================================================================

/// Result of an enroll call
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollOutcome {
    pub template: EnrolledTemplate,
    /// `false` when the same inputs were already enrolled
    pub changed: bool,
}

/// Repository for the enrolled_templates table
pub struct TemplateRepo;

impl TemplateRepo {
    /// Template of one user
    pub async fn get(pool: &SqlitePool, user_id: &str) -> PersistenceResult<Option<EnrolledTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            "SELECT * FROM enrolled_templates WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        row.map(EnrolledTemplate::try_from).transpose()
    }

    /// The only enrolled template. Fails when more than one user is enrolled.
    pub async fn get_any(pool: &SqlitePool) -> PersistenceResult<Option<EnrolledTemplate>> {
        let count = Self::count(pool).await?;
        if count > 1 {
            return Err(PersistenceError::AmbiguousIdentity { count });
        }
        let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM enrolled_templates LIMIT 1")
            .fetch_optional(pool)
            .await?;
        row.map(EnrolledTemplate::try_from).transpose()
    }

    pub async fn count(pool: &SqlitePool) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrolled_templates")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Insert or replace the user's template. Identical inputs leave the
    /// stored template (including its version and timestamp) untouched.
    pub async fn enroll_in(
        conn: &mut SqliteConnection,
        user_id: &str,
        image_ref: &str,
        features: &FeatureVector,
    ) -> PersistenceResult<EnrollOutcome> {
        let existing = sqlx::query_as::<_, TemplateRow>(
            "SELECT * FROM enrolled_templates WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(EnrolledTemplate::try_from)
        .transpose()?;

        if let Some(template) = existing.as_ref().filter(|t| t.same_inputs(image_ref, features)) {
            debug!(user_id, version = template.version, "enrollment unchanged");
            return Ok(EnrollOutcome {
                template: template.clone(),
                changed: false,
            });
        }

        let version = existing.map_or(1, |t| t.version.saturating_add(1));
        let enrolled_at_ms = Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO enrolled_templates (user_id, image_ref, features, enrolled_at_ms, version)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                image_ref = excluded.image_ref,
                features = excluded.features,
                enrolled_at_ms = excluded.enrolled_at_ms,
                version = excluded.version
            "#,
        )
        .bind(user_id)
        .bind(image_ref)
        .bind(features.to_json()?)
        .bind(enrolled_at_ms)
        .bind(i64::from(version))
        .execute(&mut *conn)
        .await?;

        Ok(EnrollOutcome {
            template: EnrolledTemplate {
                user_id: user_id.to_string(),
                image_ref: image_ref.to_string(),
                features: features.clone(),
                enrolled_at: from_millis(enrolled_at_ms)?,
                version,
            },
            changed: true,
        })
    }

    /// Delete a user's template; `false` when none was enrolled
    pub async fn delete(pool: &SqlitePool, user_id: &str) -> PersistenceResult<bool> {
        let result = sqlx::query("DELETE FROM enrolled_templates WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Ledger Repository
// ============================================================================

/// Keyset position in the newest-first timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub timestamp_ms: i64,
    pub id: i64,
}

impl From<&ScanEvent> for PageCursor {
    fn from(event: &ScanEvent) -> Self {
        Self {
            timestamp_ms: event.timestamp.timestamp_millis(),
            id: event.id,
        }
    }
}

/// Repository for the scan_events table. There is no update or delete.
pub struct LedgerRepo;

impl LedgerRepo {
    /// Append one entry in its own transaction
    pub async fn append(pool: &SqlitePool, event: &NewScanEvent) -> PersistenceResult<ScanEvent> {
        let mut tx = begin_write(pool).await?;
        let stored = Self::append_in(&mut tx, event).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Append inside the caller's transaction. The timestamp is clamped so it
    /// never goes backwards for the same user.
    pub async fn append_in(
        conn: &mut SqliteConnection,
        event: &NewScanEvent,
    ) -> PersistenceResult<ScanEvent> {
        let latest: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(timestamp_ms) FROM scan_events WHERE user_id = ?")
                .bind(&event.user_id)
                .fetch_one(&mut *conn)
                .await?;
        let requested = event.timestamp.timestamp_millis();
        let timestamp_ms = latest.0.map_or(requested, |last| requested.max(last));

        let result = sqlx::query(
            r#"
            INSERT INTO scan_events (user_id, kind, timestamp_ms, image_ref, counterparty, amount, note)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.user_id)
        .bind(event.kind.as_str())
        .bind(timestamp_ms)
        .bind(&event.image_ref)
        .bind(&event.counterparty)
        .bind(event.amount.to_string())
        .bind(&event.note)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, user_id = %event.user_id, kind = %event.kind, "ledger entry appended");

        Ok(ScanEvent {
            id,
            user_id: event.user_id.clone(),
            kind: event.kind,
            timestamp: from_millis(timestamp_ms)?,
            image_ref: event.image_ref.clone(),
            counterparty: event.counterparty.clone(),
            amount: event.amount,
            note: event.note.clone(),
        })
    }

    /// Whole ledger, newest first
    pub async fn list_all(pool: &SqlitePool) -> PersistenceResult<Vec<ScanEvent>> {
        let rows = sqlx::query_as::<_, ScanEventRow>(
            "SELECT * FROM scan_events ORDER BY timestamp_ms DESC, id DESC",
        )
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(ScanEvent::try_from).collect()
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> PersistenceResult<Vec<ScanEvent>> {
        let rows = sqlx::query_as::<_, ScanEventRow>(
            "SELECT * FROM scan_events WHERE user_id = ? ORDER BY timestamp_ms DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(ScanEvent::try_from).collect()
    }

    /// One page of the newest-first timeline, strictly after `cursor`
    pub async fn page(
        pool: &SqlitePool,
        cursor: Option<PageCursor>,
        limit: u32,
    ) -> PersistenceResult<Vec<ScanEvent>> {
        let rows = match cursor {
            None => {
                sqlx::query_as::<_, ScanEventRow>(
                    "SELECT * FROM scan_events ORDER BY timestamp_ms DESC, id DESC LIMIT ?",
                )
                .bind(i64::from(limit))
                .fetch_all(pool)
                .await?
            }
            Some(c) => {
                sqlx::query_as::<_, ScanEventRow>(
                    r#"
                    SELECT * FROM scan_events
                    WHERE timestamp_ms < ? OR (timestamp_ms = ? AND id < ?)
                    ORDER BY timestamp_ms DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(c.timestamp_ms)
                .bind(c.timestamp_ms)
                .bind(c.id)
                .bind(i64::from(limit))
                .fetch_all(pool)
                .await?
            }
        };
        rows.into_iter().map(ScanEvent::try_from).collect()
    }

    pub async fn count(pool: &SqlitePool) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scan_events")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Newest settled payment with a positive amount
    pub async fn latest_successful_payment(pool: &SqlitePool) -> PersistenceResult<Option<ScanEvent>> {
        let rows = sqlx::query_as::<_, ScanEventRow>(
            "SELECT * FROM scan_events WHERE kind = ? ORDER BY timestamp_ms DESC, id DESC",
        )
        .bind(EventKind::PaymentSuccess.as_str())
        .fetch_all(pool)
        .await?;

        for row in rows {
            let event = ScanEvent::try_from(row)?;
            if event.is_successful_payment() {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Sum of amounts appended after the most recent balance reset
    pub async fn sum_since_last_reset(pool: &SqlitePool) -> PersistenceResult<Decimal> {
        let amounts: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT amount FROM scan_events
            WHERE id > COALESCE((SELECT MAX(id) FROM scan_events WHERE kind = ?), 0)
            "#,
        )
        .bind(EventKind::BalanceReset.as_str())
        .fetch_all(pool)
        .await?;

        amounts
            .iter()
            .try_fold(Decimal::ZERO, |sum, (raw,)| -> PersistenceResult<Decimal> {
                Ok(sum + parse_decimal(raw)?)
            })
    }
}

// ============================================================================
// Wallet Repository
// ============================================================================

/// Repository for the single-row wallet table
pub struct WalletRepo;

impl WalletRepo {
    pub async fn balance(pool: &SqlitePool) -> PersistenceResult<Decimal> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallet WHERE id = 1")
            .fetch_optional(pool)
            .await?;
        row.map_or(Ok(Decimal::ZERO), |r| parse_decimal(&r.balance))
    }

    pub async fn balance_in(conn: &mut SqliteConnection) -> PersistenceResult<Decimal> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallet WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?;
        row.map_or(Ok(Decimal::ZERO), |r| parse_decimal(&r.balance))
    }

    pub async fn set_in(conn: &mut SqliteConnection, balance: Decimal) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet (id, balance, updated_at_ms) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                balance = excluded.balance,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(balance.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Add a signed delta; returns the new balance
    pub async fn apply_delta_in(
        conn: &mut SqliteConnection,
        delta: Decimal,
    ) -> PersistenceResult<Decimal> {
        let new_balance = Self::balance_in(conn).await? + delta;
        Self::set_in(conn, new_balance).await?;
        Ok(new_balance)
    }

    pub async fn apply_delta(pool: &SqlitePool, delta: Decimal) -> PersistenceResult<Decimal> {
        let mut tx = begin_write(pool).await?;
        let new_balance = Self::apply_delta_in(&mut tx, delta).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// Set the balance to zero; returns the previous balance
    pub async fn reset(pool: &SqlitePool) -> PersistenceResult<Decimal> {
        let mut tx = begin_write(pool).await?;
        let previous = Self::balance_in(&mut tx).await?;
        Self::set_in(&mut tx, Decimal::ZERO).await?;
        tx.commit().await?;
        Ok(previous)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// How long a writer waits for another writer's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a write transaction holding SQLite's write lock from the first
/// statement. A deferred transaction that reads before writing can hit
/// `SQLITE_BUSY` without waiting when another writer upgrades first.
pub async fn begin_write(pool: &SqlitePool) -> PersistenceResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Open (creating the file if needed) and ensure the schema exists
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePool::connect_with(options).await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Private in-memory database. A single connection that never expires, since
/// every new connection would see an empty database.
pub async fn connect_in_memory() -> PersistenceResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn features(offset: f32) -> FeatureVector {
        FeatureVector::new((0..palmpay_core::FEATURE_LEN).map(|i| i as f32 * 0.1 + offset).collect())
            .unwrap()
    }

    async fn enroll(pool: &SqlitePool, user: &str, image: &str, f: &FeatureVector) -> EnrollOutcome {
        let mut conn = pool.acquire().await.unwrap();
        TemplateRepo::enroll_in(&mut conn, user, image, f).await.unwrap()
    }

    #[tokio::test]
    async fn test_enroll_and_lookup() {
        let pool = connect_in_memory().await.unwrap();
        let outcome = enroll(&pool, "user_001", "file:///a.jpg", &features(0.0)).await;
        assert!(outcome.changed);
        assert_eq!(outcome.template.version, 1);

        let stored = TemplateRepo::get(&pool, "user_001").await.unwrap().unwrap();
        assert_eq!(stored, outcome.template);
        assert!(TemplateRepo::get(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enroll_idempotent_and_replace() {
        let pool = connect_in_memory().await.unwrap();
        let first = enroll(&pool, "user_001", "file:///a.jpg", &features(0.0)).await;
        let again = enroll(&pool, "user_001", "file:///a.jpg", &features(0.0)).await;
        assert!(!again.changed);
        assert_eq!(again.template, first.template);

        let replaced = enroll(&pool, "user_001", "file:///b.jpg", &features(0.5)).await;
        assert!(replaced.changed);
        assert_eq!(replaced.template.version, 2);
        assert_eq!(TemplateRepo::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_any_requires_single_user() {
        let pool = connect_in_memory().await.unwrap();
        assert!(TemplateRepo::get_any(&pool).await.unwrap().is_none());

        enroll(&pool, "alice", "a", &features(0.0)).await;
        assert_eq!(
            TemplateRepo::get_any(&pool).await.unwrap().unwrap().user_id,
            "alice"
        );

        enroll(&pool, "bob", "b", &features(1.0)).await;
        assert!(matches!(
            TemplateRepo::get_any(&pool).await,
            Err(PersistenceError::AmbiguousIdentity { count: 2 })
        ));
    }

    #[tokio::test]
    async fn test_delete_template() {
        let pool = connect_in_memory().await.unwrap();
        enroll(&pool, "alice", "a", &features(0.0)).await;
        assert!(TemplateRepo::delete(&pool, "alice").await.unwrap());
        assert!(!TemplateRepo::delete(&pool, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_newest_first_and_count() {
        let pool = connect_in_memory().await.unwrap();
        let base = Utc::now();
        for i in 0..3 {
            let event = NewScanEvent::adjustment("user_001", dec!(1)).at(base + Duration::seconds(i));
            LedgerRepo::append(&pool, &event).await.unwrap();
        }

        let all = LedgerRepo::list_all(&pool).await.unwrap();
        assert_eq!(all.len() as i64, LedgerRepo::count(&pool).await.unwrap());
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(all[0].id, 3);
    }

    #[tokio::test]
    async fn test_timestamps_clamped_per_user() {
        let pool = connect_in_memory().await.unwrap();
        let now = Utc::now();
        let first = LedgerRepo::append(&pool, &NewScanEvent::adjustment("u", dec!(1)).at(now))
            .await
            .unwrap();
        let earlier = NewScanEvent::adjustment("u", dec!(1)).at(now - Duration::minutes(5));
        let second = LedgerRepo::append(&pool, &earlier).await.unwrap();
        assert_eq!(second.timestamp, first.timestamp);

        // Other users are unaffected
        let other = NewScanEvent::adjustment("v", dec!(1)).at(now - Duration::minutes(5));
        let third = LedgerRepo::append(&pool, &other).await.unwrap();
        assert!(third.timestamp < first.timestamp);
    }

    #[tokio::test]
    async fn test_paging_walks_whole_ledger() {
        let pool = connect_in_memory().await.unwrap();
        let now = Utc::now();
        for _ in 0..5 {
            // Same millisecond: ordering falls back to id
            LedgerRepo::append(&pool, &NewScanEvent::adjustment("u", dec!(1)).at(now))
                .await
                .unwrap();
        }

        let first = LedgerRepo::page(&pool, None, 2).await.unwrap();
        let second = LedgerRepo::page(&pool, first.last().map(PageCursor::from), 2).await.unwrap();
        let third = LedgerRepo::page(&pool, second.last().map(PageCursor::from), 2).await.unwrap();
        let ids: Vec<i64> = first.iter().chain(&second).chain(&third).map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_latest_successful_payment() {
        let pool = connect_in_memory().await.unwrap();
        assert!(LedgerRepo::latest_successful_payment(&pool).await.unwrap().is_none());

        let paid = LedgerRepo::append(&pool, &NewScanEvent::payment_success("u", dec!(150.00), "Shop"))
            .await
            .unwrap();
        LedgerRepo::append(&pool, &NewScanEvent::payment_failure("u", "Shop", "match rejected"))
            .await
            .unwrap();

        let latest = LedgerRepo::latest_successful_payment(&pool).await.unwrap().unwrap();
        assert_eq!(latest.id, paid.id);
    }

    #[tokio::test]
    async fn test_wallet_delta_and_reset() {
        let pool = connect_in_memory().await.unwrap();
        assert_eq!(WalletRepo::balance(&pool).await.unwrap(), Decimal::ZERO);
        assert_eq!(WalletRepo::apply_delta(&pool, dec!(150.00)).await.unwrap(), dec!(150.00));
        assert_eq!(WalletRepo::apply_delta(&pool, dec!(-30.50)).await.unwrap(), dec!(119.50));
        assert_eq!(WalletRepo::reset(&pool).await.unwrap(), dec!(119.50));
        assert_eq!(WalletRepo::balance(&pool).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_sum_since_last_reset() {
        let pool = connect_in_memory().await.unwrap();
        LedgerRepo::append(&pool, &NewScanEvent::adjustment("u", dec!(10))).await.unwrap();
        LedgerRepo::append(&pool, &NewScanEvent::balance_reset("u", dec!(10))).await.unwrap();
        LedgerRepo::append(&pool, &NewScanEvent::adjustment("u", dec!(2.5))).await.unwrap();
        assert_eq!(LedgerRepo::sum_since_last_reset(&pool).await.unwrap(), dec!(2.5));
    }
}

//! # PalmPay Persistence
//!
//! SQLite persistence for PalmPay: the biometric template store, the
//! append-only transaction ledger and the wallet balance.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Database                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ TemplateRepo │   │  LedgerRepo  │   │    WalletRepo    │  │
//! │  │  (templates) │   │ (scan_events)│   │     (wallet)     │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! │        joint writes run in one SQL transaction               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use palmpay_persistence::{Database, LedgerRepo};
//!
//! let db = Database::new("sqlite:palmpay.db").await?;
//! let settled = db.settle(&NewScanEvent::payment_success("user_001", amount, "Shop")).await?;
//! let history = LedgerRepo::list_all(db.pool()).await?;
//! ```

pub mod error;
pub mod pager;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use pager::HistoryPager;
pub use sqlite::{
    begin_write, connect_in_memory, init_database, EnrollOutcome, LedgerRepo, PageCursor,
    TemplateRepo, WalletRepo,
};
pub use sqlite::schema::{ScanEventRow, TemplateRow, WalletRow};

use palmpay_core::{EnrolledTemplate, FeatureVector, NewScanEvent, ScanEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

/// A template write together with its ledger entry
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub template: EnrolledTemplate,
    pub changed: bool,
    /// Ledger entry, absent when nothing changed
    pub event: Option<ScanEvent>,
}

/// A committed wallet change and the ledger entry written with it
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub event: ScanEvent,
    pub balance_after: Decimal,
}

/// Stored balance against the ledger since the last reset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub stored: Decimal,
    pub ledger_sum: Decimal,
    pub consistent: bool,
}

/// Database facade: the pool plus the writes that span tables
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) a database such as `sqlite:palmpay.db`
    pub async fn new(db_url: &str) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> PersistenceResult<Self> {
        let pool = connect_in_memory().await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a template; a changed template also appends an
    /// `Enrollment` ledger entry in the same transaction.
    pub async fn enroll(
        &self,
        user_id: &str,
        image_ref: &str,
        features: &FeatureVector,
    ) -> PersistenceResult<Enrollment> {
        let mut tx = begin_write(&self.pool).await?;
        let outcome = TemplateRepo::enroll_in(&mut tx, user_id, image_ref, features).await?;
        let event = if outcome.changed {
            let entry = NewScanEvent::enrollment(user_id, image_ref, outcome.template.version);
            Some(LedgerRepo::append_in(&mut tx, &entry).await?)
        } else {
            None
        };
        tx.commit().await?;

        Ok(Enrollment {
            template: outcome.template,
            changed: outcome.changed,
            event,
        })
    }

    /// Apply `event.amount` to the wallet and append `event`, atomically.
    /// Either both are committed or neither is.
    pub async fn settle(&self, event: &NewScanEvent) -> PersistenceResult<Settlement> {
        let mut tx = begin_write(&self.pool).await?;
        let balance_after = WalletRepo::apply_delta_in(&mut tx, event.amount).await?;
        let stored = LedgerRepo::append_in(&mut tx, event).await?;
        tx.commit().await?;

        info!(
            event_id = stored.id,
            user_id = %stored.user_id,
            kind = %stored.kind,
            amount = %stored.amount,
            balance = %balance_after,
            "settled"
        );
        Ok(Settlement {
            event: stored,
            balance_after,
        })
    }

    /// Manual deposit (positive) or withdrawal (negative). A withdrawal may
    /// not take the balance below zero.
    pub async fn adjust(&self, user_id: &str, delta: Decimal) -> PersistenceResult<Settlement> {
        let mut tx = begin_write(&self.pool).await?;
        let available = WalletRepo::balance_in(&mut tx).await?;
        if available + delta < Decimal::ZERO {
            return Err(PersistenceError::InsufficientBalance {
                needed: -delta,
                available,
            });
        }
        let balance_after = WalletRepo::apply_delta_in(&mut tx, delta).await?;
        let stored = LedgerRepo::append_in(&mut tx, &NewScanEvent::adjustment(user_id, delta)).await?;
        tx.commit().await?;

        info!(event_id = stored.id, %delta, balance = %balance_after, "wallet adjusted");
        Ok(Settlement {
            event: stored,
            balance_after,
        })
    }

    /// Zero the wallet and record a `BalanceReset` entry
    pub async fn reset_balance(&self, user_id: &str) -> PersistenceResult<Settlement> {
        let mut tx = begin_write(&self.pool).await?;
        let previous = WalletRepo::balance_in(&mut tx).await?;
        WalletRepo::set_in(&mut tx, Decimal::ZERO).await?;
        let stored =
            LedgerRepo::append_in(&mut tx, &NewScanEvent::balance_reset(user_id, previous)).await?;
        tx.commit().await?;

        info!(event_id = stored.id, %previous, "wallet reset");
        Ok(Settlement {
            event: stored,
            balance_after: Decimal::ZERO,
        })
    }

    pub async fn reconcile(&self) -> PersistenceResult<Reconciliation> {
        let stored = WalletRepo::balance(&self.pool).await?;
        let ledger_sum = LedgerRepo::sum_since_last_reset(&self.pool).await?;
        Ok(Reconciliation {
            stored,
            ledger_sum,
            consistent: stored == ledger_sum,
        })
    }

    /// Newest-first pager over the whole ledger
    pub fn history_pager(&self, page_size: u32) -> HistoryPager {
        HistoryPager::new(self.pool.clone(), page_size)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palmpay_core::{EventKind, FEATURE_LEN};
    use rust_decimal_macros::dec;

    fn features(offset: f32) -> FeatureVector {
        FeatureVector::new((0..FEATURE_LEN).map(|i| i as f32 * 0.1 + offset).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_enroll_writes_ledger_once() {
        let db = Database::in_memory().await.unwrap();
        let first = db.enroll("user_001", "file:///a.jpg", &features(0.0)).await.unwrap();
        assert!(first.event.is_some());
        let again = db.enroll("user_001", "file:///a.jpg", &features(0.0)).await.unwrap();
        assert!(again.event.is_none());

        let history = LedgerRepo::list_all(db.pool()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EventKind::Enrollment);
        assert_eq!(history[0].amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_settle_is_joint() {
        let db = Database::in_memory().await.unwrap();
        let settled = db
            .settle(&NewScanEvent::payment_success("user_001", dec!(150.00), "Kiran Kirana Store"))
            .await
            .unwrap();
        assert_eq!(settled.balance_after, dec!(150.00));
        assert_eq!(WalletRepo::balance(db.pool()).await.unwrap(), dec!(150.00));
        assert_eq!(LedgerRepo::count(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settle_rolls_back_on_ledger_failure() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("DROP TABLE scan_events").execute(db.pool()).await.unwrap();

        let result = db
            .settle(&NewScanEvent::payment_success("user_001", dec!(10), "Shop"))
            .await;
        assert!(result.unwrap_err().is_database_error());
        assert_eq!(WalletRepo::balance(db.pool()).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_withdraw_beyond_balance_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.adjust("user_001", dec!(20)).await.unwrap();
        let err = db.adjust("user_001", dec!(-25)).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::InsufficientBalance { needed, available }
                if needed == dec!(25) && available == dec!(20)
        ));
        assert_eq!(WalletRepo::balance(db.pool()).await.unwrap(), dec!(20));
    }

    #[tokio::test]
    async fn test_reconcile_across_reset() {
        let db = Database::in_memory().await.unwrap();
        db.adjust("user_001", dec!(100)).await.unwrap();
        db.settle(&NewScanEvent::payment_success("user_001", dec!(50), "Shop"))
            .await
            .unwrap();
        assert!(db.reconcile().await.unwrap().consistent);

        db.reset_balance("user_001").await.unwrap();
        db.adjust("user_001", dec!(5)).await.unwrap();
        let report = db.reconcile().await.unwrap();
        assert_eq!(report.stored, dec!(5));
        assert!(report.consistent);

        // A raw delta outside the ledger is detected
        WalletRepo::apply_delta(db.pool(), dec!(1)).await.unwrap();
        assert!(!db.reconcile().await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("palmpay.db").display());
        {
            let db = Database::new(&url).await.unwrap();
            db.adjust("user_001", dec!(42)).await.unwrap();
            db.close().await;
        }
        let db = Database::new(&url).await.unwrap();
        assert_eq!(WalletRepo::balance(db.pool()).await.unwrap(), dec!(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_disk_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("palmpay.db").display());
        let db = Database::new(&url).await.unwrap();

        // Deposits race payments; each reads the balance before writing it
        let mut tasks = Vec::new();
        for i in 0..20 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    db.adjust("user_001", dec!(1)).await.map(|_| ())
                } else {
                    let entry = NewScanEvent::payment_success("user_001", dec!(1), "Shop");
                    db.settle(&entry).await.map(|_| ())
                }
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(WalletRepo::balance(db.pool()).await.unwrap(), dec!(20));
        assert_eq!(LedgerRepo::count(db.pool()).await.unwrap(), 20);
        assert!(db.reconcile().await.unwrap().consistent);
    }
}

//! # PalmPay Settlement
//!
//! Service layer: enrollment, the payment settlement coordinator, wallet and
//! history operations, and the [`PalmPay`] facade callers use.
//!
//! ```rust,ignore
//! let palmpay = PalmPay::new(Database::new("sqlite:palmpay.db").await?, SettlementConfig::default());
//! palmpay.start_enrollment("user_001", "file:///palm.jpg", &detection).await?;
//!
//! let (session, mut detections) = CaptureSession::start(provider, frames, 4)?;
//! let request = PaymentRequest::new("user_001", dec!(150.00), "Kiran Kirana Store");
//! let outcome = palmpay.start_payment(&request, &mut detections, &CancelHandle::new()).await?;
//! session.close().await;
//! ```

pub mod coordinator;
pub mod enrollment;
pub mod error;
pub mod gate;
pub mod history;
pub mod services;
pub mod wallet;

pub use coordinator::{CancelHandle, SettlementCoordinator};
pub use enrollment::EnrollmentService;
pub use error::{ServiceError, ServiceResult};
pub use gate::{SessionGate, SessionGuard};
pub use history::HistoryService;
pub use services::{
    ServiceContext, SettlementConfig, StoreChange, TemplateResult, WalletResult,
    DEFAULT_COUNTERPARTY,
};
pub use wallet::WalletService;

use std::sync::Arc;

use palmpay_biometrics::{DetectionStream, MatchEngine};
use palmpay_core::{Detection, EnrolledTemplate, PaymentOutcome, PaymentRequest, ScanEvent};
use palmpay_persistence::{Database, HistoryPager, Reconciliation};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

/// Caller-facing API over one database
pub struct PalmPay {
    ctx: ServiceContext,
}

impl PalmPay {
    pub fn new(db: Database, config: SettlementConfig) -> Self {
        Self {
            ctx: ServiceContext::new(db, config),
        }
    }

    pub fn with_matcher(db: Database, config: SettlementConfig, matcher: Arc<dyn MatchEngine>) -> Self {
        Self {
            ctx: ServiceContext::with_matcher(db, config, matcher),
        }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn coordinator(&self) -> SettlementCoordinator<'_> {
        SettlementCoordinator::new(&self.ctx)
    }

    // === Enrollment ===

    pub async fn start_enrollment(
        &self,
        user_id: &str,
        image_ref: &str,
        detection: &Detection,
    ) -> ServiceResult<TemplateResult> {
        EnrollmentService::new(&self.ctx)
            .start_enrollment(user_id, image_ref, detection)
            .await
    }

    pub async fn lookup(&self, user_id: &str) -> ServiceResult<Option<EnrolledTemplate>> {
        EnrollmentService::new(&self.ctx).lookup(user_id).await
    }

    pub async fn remove_enrollment(&self, user_id: &str) -> ServiceResult<bool> {
        EnrollmentService::new(&self.ctx).remove(user_id).await
    }

    // === Payment ===

    pub async fn start_payment(
        &self,
        request: &PaymentRequest,
        detections: &mut DetectionStream,
        cancel: &CancelHandle,
    ) -> ServiceResult<PaymentOutcome> {
        self.coordinator().run_payment(request, detections, cancel).await
    }

    // === History ===

    pub async fn get_history(&self) -> ServiceResult<Vec<ScanEvent>> {
        HistoryService::new(&self.ctx).get_history().await
    }

    /// One user's entries, newest first
    pub async fn history_for(&self, user_id: &str) -> ServiceResult<Vec<ScanEvent>> {
        HistoryService::new(&self.ctx).history_for(user_id).await
    }

    pub fn history_pager(&self, page_size: u32) -> HistoryPager {
        HistoryService::new(&self.ctx).pager(page_size)
    }

    pub async fn latest_successful_payment(&self) -> ServiceResult<Option<ScanEvent>> {
        HistoryService::new(&self.ctx).latest_successful_payment().await
    }

    pub async fn scan_count(&self) -> ServiceResult<i64> {
        HistoryService::new(&self.ctx).scan_count().await
    }

    // === Wallet ===

    pub async fn get_balance(&self) -> ServiceResult<Decimal> {
        WalletService::new(&self.ctx).balance().await
    }

    pub async fn deposit(&self, user_id: &str, amount: Decimal) -> ServiceResult<WalletResult> {
        WalletService::new(&self.ctx).deposit(user_id, amount).await
    }

    pub async fn withdraw(&self, user_id: &str, amount: Decimal) -> ServiceResult<WalletResult> {
        WalletService::new(&self.ctx).withdraw(user_id, amount).await
    }

    pub async fn reset_balance(&self, user_id: &str) -> ServiceResult<WalletResult> {
        WalletService::new(&self.ctx).reset(user_id).await
    }

    pub async fn reconcile(&self) -> ServiceResult<Reconciliation> {
        WalletService::new(&self.ctx).reconcile().await
    }

    /// Change notifications for committed writes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.ctx.subscribe()
    }
}

//! Wallet operations - balance, manual deposit / withdraw, reset, reconcile
//!
//! Every balance change is written together with its ledger entry, so the
//! stored balance always equals the ledger sum since the last reset.

use palmpay_core::Currency;
use palmpay_persistence::{Reconciliation, WalletRepo};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::services::{ServiceContext, WalletResult};

pub struct WalletService<'a> {
    ctx: &'a ServiceContext,
    currency: Currency,
}

impl<'a> WalletService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self {
            ctx,
            currency: Currency::default(),
        }
    }

    pub async fn balance(&self) -> ServiceResult<Decimal> {
        Ok(WalletRepo::balance(self.ctx.db().pool()).await?)
    }

    pub async fn deposit(&self, user_id: &str, amount: Decimal) -> ServiceResult<WalletResult> {
        let amount = self.validate(amount)?;
        self.adjust(user_id, amount).await
    }

    pub async fn withdraw(&self, user_id: &str, amount: Decimal) -> ServiceResult<WalletResult> {
        let amount = self.validate(amount)?;
        self.adjust(user_id, -amount).await
    }

    /// Zero the balance; the ledger records the reset
    pub async fn reset(&self, user_id: &str) -> ServiceResult<WalletResult> {
        let settled = self.ctx.db().reset_balance(user_id).await?;
        self.ctx.publish_settled(&settled.event, settled.balance_after);
        Ok(WalletResult {
            event_id: settled.event.id,
            amount: Decimal::ZERO,
            balance_after: settled.balance_after,
        })
    }

    pub async fn reconcile(&self) -> ServiceResult<Reconciliation> {
        let report = self.ctx.db().reconcile().await?;
        if report.consistent {
            info!(balance = %report.stored, "wallet reconciled");
        } else {
            warn!(
                stored = %report.stored,
                ledger_sum = %report.ledger_sum,
                "wallet balance does not match ledger"
            );
        }
        Ok(report)
    }

    async fn adjust(&self, user_id: &str, delta: Decimal) -> ServiceResult<WalletResult> {
        let settled = self.ctx.db().adjust(user_id, delta).await?;
        self.ctx.publish_settled(&settled.event, settled.balance_after);
        Ok(WalletResult {
            event_id: settled.event.id,
            amount: delta,
            balance_after: settled.balance_after,
        })
    }

    fn validate(&self, amount: Decimal) -> ServiceResult<Decimal> {
        self.currency
            .validate_payment(amount)
            .map_err(|e| ServiceError::InvalidAmount(e.to_string()))
    }
}

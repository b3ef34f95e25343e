//! History queries over the transaction ledger

use palmpay_core::ScanEvent;
use palmpay_persistence::{HistoryPager, LedgerRepo};

use crate::error::ServiceResult;
use crate::services::ServiceContext;

pub struct HistoryService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> HistoryService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// All entries, newest first
    pub async fn get_history(&self) -> ServiceResult<Vec<ScanEvent>> {
        Ok(LedgerRepo::list_all(self.ctx.db().pool()).await?)
    }

    pub async fn history_for(&self, user_id: &str) -> ServiceResult<Vec<ScanEvent>> {
        Ok(LedgerRepo::list_for_user(self.ctx.db().pool(), user_id).await?)
    }

    pub fn pager(&self, page_size: u32) -> HistoryPager {
        self.ctx.db().history_pager(page_size)
    }

    pub async fn latest_successful_payment(&self) -> ServiceResult<Option<ScanEvent>> {
        Ok(LedgerRepo::latest_successful_payment(self.ctx.db().pool()).await?)
    }

    pub async fn scan_count(&self) -> ServiceResult<i64> {
        Ok(LedgerRepo::count(self.ctx.db().pool()).await?)
    }
}

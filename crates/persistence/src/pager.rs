//! Lazy, restartable view over the ledger.

use palmpay_core::ScanEvent;
use sqlx::SqlitePool;

use crate::error::PersistenceResult;
use crate::sqlite::{LedgerRepo, PageCursor};

/// Walks the ledger newest first, one keyset page at a time.
///
/// Entries appended while a walk is in progress are newer than the cursor and
/// show up after `restart`.
#[derive(Debug, Clone)]
pub struct HistoryPager {
    pool: SqlitePool,
    page_size: u32,
    cursor: Option<PageCursor>,
    exhausted: bool,
}

impl HistoryPager {
    pub fn new(pool: SqlitePool, page_size: u32) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
            cursor: None,
            exhausted: false,
        }
    }

    /// Next page; empty once the oldest entry has been returned
    pub async fn next_page(&mut self) -> PersistenceResult<Vec<ScanEvent>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let page = LedgerRepo::page(&self.pool, self.cursor, self.page_size).await?;
        if (page.len() as u32) < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(PageCursor::from(last));
        }
        Ok(page)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Rewind to the newest entry
    pub fn restart(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }
}

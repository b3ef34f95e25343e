//! SQLite persistence module
//!
//! Repository pattern for SQLite access. Three independent tables:
//! `enrolled_templates`, `scan_events` and `wallet`.

pub mod repos;
pub mod schema;

pub use repos::{
    begin_write, connect_in_memory, init_database, EnrollOutcome, LedgerRepo, PageCursor,
    TemplateRepo, WalletRepo,
};
pub use schema::{create_schema, ScanEventRow, TemplateRow, WalletRow};

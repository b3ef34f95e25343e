//! Service context and shared result types
//!
//! The context owns everything the services need: the database, the match
//! engine, tuning knobs, the single-slot session gate and the change stream.

use std::sync::Arc;
use std::time::Duration;

use palmpay_biometrics::{MatchEngine, StabilityConfig, ThresholdMatcher};
use palmpay_core::{EnrolledTemplate, EventKind, ScanEvent};
use palmpay_persistence::Database;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::gate::SessionGate;

/// Counterparty shown when a request does not name one
pub const DEFAULT_COUNTERPARTY: &str = "Kiran Kirana Store";

/// Capacity of the change stream; slow subscribers lag rather than block
const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Pause between a stable detection and the match decision
    pub processing_delay: Duration,
    pub default_counterparty: String,
    /// Bounded size of the detection channel
    pub detection_buffer: usize,
    pub stability: StabilityConfig,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(500),
            default_counterparty: DEFAULT_COUNTERPARTY.to_string(),
            detection_buffer: 4,
            stability: StabilityConfig::default(),
        }
    }
}

/// Notifications published after each committed write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum StoreChange {
    TemplateEnrolled { user_id: String, version: u32 },
    TemplateRemoved { user_id: String },
    LedgerAppended { event_id: i64, kind: EventKind },
    BalanceChanged { balance: Decimal },
}

/// Context for service operations
pub struct ServiceContext {
    db: Database,
    matcher: Arc<dyn MatchEngine>,
    config: SettlementConfig,
    gate: SessionGate,
    changes: broadcast::Sender<StoreChange>,
}

impl ServiceContext {
    /// Context with the default threshold matcher
    pub fn new(db: Database, config: SettlementConfig) -> Self {
        Self::with_matcher(db, config, Arc::new(ThresholdMatcher::default()))
    }

    pub fn with_matcher(
        db: Database,
        config: SettlementConfig,
        matcher: Arc<dyn MatchEngine>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            db,
            matcher,
            config,
            gate: SessionGate::new(),
            changes,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn matcher(&self) -> &dyn MatchEngine {
        self.matcher.as_ref()
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    /// Publish the ledger entry and resulting balance of a joint write
    pub(crate) fn publish_settled(&self, event: &ScanEvent, balance: Decimal) {
        self.publish(StoreChange::LedgerAppended {
            event_id: event.id,
            kind: event.kind,
        });
        self.publish(StoreChange::BalanceChanged { balance });
    }
}

/// Enrollment result
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateResult {
    pub template: EnrolledTemplate,
    /// `false` when identical inputs were already enrolled
    pub changed: bool,
    pub event_id: Option<i64>,
}

/// Result of a manual wallet operation
#[derive(Debug, Clone, PartialEq)]
pub struct WalletResult {
    pub event_id: i64,
    pub amount: Decimal,
    pub balance_after: Decimal,
}

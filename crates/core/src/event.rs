//! # Event Module
//!
//! Ledger entries. Every enrollment, payment attempt and wallet adjustment
//! leaves one immutable `ScanEvent`; the kind is a tagged variant rather than
//! a free-text convention, and the counterparty is a structured field.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A palm template was enrolled or replaced
    Enrollment,
    /// A matched payment was settled into the wallet
    PaymentSuccess,
    /// A payment attempt that reached matching but did not settle
    PaymentFailure,
    /// Manual wallet deposit or withdrawal
    Adjustment,
    /// Wallet reset to zero; starts a new reconciliation window
    BalanceReset,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Enrollment => "enrollment",
            EventKind::PaymentSuccess => "payment_success",
            EventKind::PaymentFailure => "payment_failure",
            EventKind::Adjustment => "adjustment",
            EventKind::BalanceReset => "balance_reset",
        }
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrollment" => Ok(EventKind::Enrollment),
            "payment_success" => Ok(EventKind::PaymentSuccess),
            "payment_failure" => Ok(EventKind::PaymentFailure),
            "adjustment" => Ok(EventKind::Adjustment),
            "balance_reset" => Ok(EventKind::BalanceReset),
            other => Err(CoreError::UnknownEventKind(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry that has not been written yet.
///
/// The sequence number and final timestamp are assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScanEvent {
    pub user_id: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NewScanEvent {
    pub fn new(user_id: &str, kind: EventKind) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            timestamp: Utc::now(),
            image_ref: None,
            counterparty: None,
            amount: Decimal::ZERO,
            note: None,
        }
    }

    // === Builder methods ===

    pub fn with_image(mut self, image_ref: &str) -> Self {
        self.image_ref = Some(image_ref.to_string());
        self
    }

    pub fn with_counterparty(mut self, counterparty: &str) -> Self {
        self.counterparty = Some(counterparty.to_string());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    // === Factory methods ===

    pub fn enrollment(user_id: &str, image_ref: &str, version: u32) -> Self {
        Self::new(user_id, EventKind::Enrollment)
            .with_image(image_ref)
            .with_note(format!("Palm enrollment v{}", version))
    }

    pub fn payment_success(user_id: &str, amount: Decimal, counterparty: &str) -> Self {
        Self::new(user_id, EventKind::PaymentSuccess)
            .with_amount(amount)
            .with_counterparty(counterparty)
    }

    /// Failed attempts never carry money; `reason` goes in the note
    pub fn payment_failure(user_id: &str, counterparty: &str, reason: &str) -> Self {
        Self::new(user_id, EventKind::PaymentFailure)
            .with_counterparty(counterparty)
            .with_note(reason)
    }

    pub fn adjustment(user_id: &str, delta: Decimal) -> Self {
        Self::new(user_id, EventKind::Adjustment).with_amount(delta)
    }

    pub fn balance_reset(user_id: &str, previous: Decimal) -> Self {
        Self::new(user_id, EventKind::BalanceReset)
            .with_note(format!("Balance reset from {}", previous))
    }
}

/// A committed, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Ledger sequence number
    pub id: i64,
    pub user_id: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ScanEvent {
    pub fn is_successful_payment(&self) -> bool {
        self.kind == EventKind::PaymentSuccess && self.amount > Decimal::ZERO
    }

    /// Display label for history screens
    pub fn label(&self) -> String {
        match (self.kind, self.counterparty.as_deref()) {
            (EventKind::Enrollment, _) => "Palm Enrollment".to_string(),
            (EventKind::PaymentSuccess, Some(cp)) => format!("Payment from {}", cp),
            (EventKind::PaymentFailure, Some(cp)) => format!("Failed payment from {}", cp),
            (EventKind::PaymentSuccess, None) => "Payment".to_string(),
            (EventKind::PaymentFailure, None) => "Failed payment".to_string(),
            (EventKind::Adjustment, _) if self.amount.is_sign_negative() => {
                "Withdrawal".to_string()
            }
            (EventKind::Adjustment, _) => "Deposit".to_string(),
            (EventKind::BalanceReset, _) => "Balance reset".to_string(),
        }
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {} {} ({})",
            self.id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.user_id,
            self.label(),
            self.amount
        )
    }
}

//! # Outcome Module
//!
//! What a payment attempt reports to its caller. Every terminal path,
//! including persistence failures, resolves to an [`Outcome`] instead of an
//! error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::money::{Currency, Money};

/// Terminal result of one payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Matched and settled
    Success,
    /// The detection feed ended before a stable hand was seen
    NoHandDetected,
    /// No template is enrolled for the user
    NoEnrollmentFound,
    /// The live sample did not match the template
    MatchRejected { score: f32 },
    /// Amount was zero, negative or too precise; rejected before matching
    InvalidAmount,
    /// User id was empty or padded; rejected before matching
    InvalidUser,
    /// Template lookup or settlement write failed; nothing was committed
    Failed { reason: String },
    /// Camera or landmark provider unavailable
    ResourceUnavailable,
    /// Caller cancelled before settlement started
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NoHandDetected => "no_hand_detected",
            Outcome::NoEnrollmentFound => "no_enrollment_found",
            Outcome::MatchRejected { .. } => "match_rejected",
            Outcome::InvalidAmount => "invalid_amount",
            Outcome::InvalidUser => "invalid_user",
            Outcome::Failed { .. } => "failed",
            Outcome::ResourceUnavailable => "resource_unavailable",
            Outcome::Cancelled => "cancelled",
        }
    }

    /// Whether this outcome leaves a `PaymentFailure` entry in the ledger.
    ///
    /// Only attempts that got as far as a template decision are recorded;
    /// everything else leaves the ledger untouched.
    pub fn records_failure(&self) -> bool {
        matches!(
            self,
            Outcome::NoEnrollmentFound | Outcome::MatchRejected { .. }
        )
    }

    /// Human-readable reason, used for ledger notes and receipts
    pub fn describe(&self) -> String {
        match self {
            Outcome::Success => "Payment successful".to_string(),
            Outcome::NoHandDetected => "No hand detected".to_string(),
            Outcome::NoEnrollmentFound => "No enrolled palm".to_string(),
            Outcome::MatchRejected { score } => format!("Match rejected (score {:.3})", score),
            Outcome::InvalidAmount => "Invalid amount".to_string(),
            Outcome::InvalidUser => "Invalid user id".to_string(),
            Outcome::Failed { reason } => format!("Failed: {}", reason),
            Outcome::ResourceUnavailable => "Camera unavailable".to_string(),
            Outcome::Cancelled => "Cancelled".to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::MatchRejected { score } => write!(f, "match_rejected (score {:.3})", score),
            Outcome::Failed { reason } => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// A request to take a palm payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub user_id: String,
    pub amount: Decimal,
    pub counterparty: String,
    #[serde(default)]
    pub currency: Currency,
}

impl PaymentRequest {
    pub fn new(user_id: &str, amount: Decimal, counterparty: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount,
            counterparty: counterparty.to_string(),
            currency: Currency::default(),
        }
    }

    pub fn money(&self) -> Money {
        Money::new(self.amount, self.currency.clone())
    }
}

/// Result handed back to the caller of `start_payment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub attempt_id: Uuid,
    pub outcome: Outcome,
    pub amount: Decimal,
    pub counterparty_label: String,
    /// Wallet balance after commit, only for successful attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Decimal>,
    /// Ledger entry written for this attempt, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
}

impl PaymentOutcome {
    pub fn new(attempt_id: Uuid, request: &PaymentRequest, outcome: Outcome) -> Self {
        Self {
            attempt_id,
            outcome,
            amount: request.amount,
            counterparty_label: request.counterparty.clone(),
            balance_after: None,
            event_id: None,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn with_event(mut self, event_id: i64) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance_after = Some(balance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_failure_recording_policy() {
        assert!(Outcome::NoEnrollmentFound.records_failure());
        assert!(Outcome::MatchRejected { score: 0.4 }.records_failure());
        assert!(!Outcome::InvalidAmount.records_failure());
        assert!(!Outcome::InvalidUser.records_failure());
        assert!(!Outcome::Cancelled.records_failure());
        assert!(!Outcome::Success.records_failure());
        assert!(!Outcome::Failed { reason: "disk".into() }.records_failure());
    }

    #[test]
    fn test_describe() {
        assert_eq!(Outcome::NoEnrollmentFound.describe(), "No enrolled palm");
        assert_eq!(
            Outcome::MatchRejected { score: 0.4123 }.describe(),
            "Match rejected (score 0.412)"
        );
    }

    #[test]
    fn test_outcome_json_is_tagged() {
        let json = serde_json::to_string(&Outcome::MatchRejected { score: 0.5 }).unwrap();
        assert_eq!(json, r#"{"outcome":"match_rejected","score":0.5}"#);
    }

    #[test]
    fn test_payment_outcome_builders() {
        let req = PaymentRequest::new("user_001", dec!(150.00), "Kiran Kirana Store");
        let out = PaymentOutcome::new(Uuid::new_v4(), &req, Outcome::Success)
            .with_event(7)
            .with_balance(dec!(150.00));
        assert!(out.success());
        assert_eq!(out.event_id, Some(7));
        assert_eq!(out.counterparty_label, "Kiran Kirana Store");
        assert_eq!(req.money().to_string(), "₹150.00");
    }
}

//! # Attempt State Machine
//!
//! `Idle -> AwaitingDetection -> Matching -> Settling -> Done(outcome)`.
//!
//! The coordinator owns one [`AttemptState`] per session and moves it only
//! through [`AttemptState::advance`], which rejects transitions the payment
//! flow does not allow.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::outcome::Outcome;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptState {
    #[default]
    Idle,
    AwaitingDetection,
    Matching,
    Settling,
    Done { outcome: Outcome },
}

impl AttemptState {
    pub fn done(outcome: Outcome) -> Self {
        AttemptState::Done { outcome }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::AwaitingDetection => "awaiting_detection",
            AttemptState::Matching => "matching",
            AttemptState::Settling => "settling",
            AttemptState::Done { .. } => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Done { .. })
    }

    /// Matching and Settling hold the session's single processing slot
    pub fn is_busy(&self) -> bool {
        matches!(self, AttemptState::Matching | AttemptState::Settling)
    }

    fn allows(&self, next: &AttemptState) -> bool {
        use AttemptState::*;
        match (self, next) {
            (Idle, AwaitingDetection) => true,
            (Idle, Done { outcome }) => {
                matches!(
                    outcome,
                    Outcome::InvalidAmount | Outcome::InvalidUser | Outcome::Cancelled
                )
            }
            (AwaitingDetection, Matching) => true,
            (AwaitingDetection, Done { outcome }) => matches!(
                outcome,
                Outcome::NoEnrollmentFound
                    | Outcome::NoHandDetected
                    | Outcome::ResourceUnavailable
                    | Outcome::Cancelled
                    | Outcome::Failed { .. }
            ),
            (Matching, Settling) => true,
            (Matching, Done { outcome }) => matches!(
                outcome,
                Outcome::MatchRejected { .. } | Outcome::Cancelled | Outcome::Failed { .. }
            ),
            (Settling, Done { outcome }) => {
                matches!(outcome, Outcome::Success | Outcome::Failed { .. })
            }
            (Done { .. }, Idle) => true,
            _ => false,
        }
    }

    /// Returns the next state, or an error if the move is not part of the flow
    pub fn advance(&self, next: AttemptState) -> CoreResult<AttemptState> {
        if self.allows(&next) {
            Ok(next)
        } else {
            Err(CoreError::IllegalTransition {
                from: self.clone(),
                to: next,
            })
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Done { outcome } => write!(f, "done({})", outcome),
            other => write!(f, "{}", other.name()),
        }
    }
}

//! Settlement coordinator.
//!
//! Drives one payment attempt through
//! `Idle -> AwaitingDetection -> Matching -> Settling -> Done(outcome)`.
//!
//! - The detection feed is debounced by a [`StabilityWindow`]; only a stable,
//!   live hand moves the attempt to `Matching`.
//! - Matching and settling hold the [`SessionGate`] slot. A stable detection
//!   that finds the slot taken is dropped and the attempt keeps waiting.
//! - A [`CancelHandle`] is honoured until settlement starts. Settlement
//!   itself always runs to completion.
//! - Outcomes for which [`Outcome::records_failure`] holds leave a
//!   zero-amount `PaymentFailure` ledger entry; the balance moves only on
//!   success.

use std::sync::Arc;

use palmpay_biometrics::{extract, DetectionStream, StabilityVerdict, StabilityWindow};
use palmpay_core::{
    validate_user_id, AttemptState, Detection, NewScanEvent, Outcome, PaymentOutcome,
    PaymentRequest,
};
use palmpay_persistence::{LedgerRepo, TemplateRepo};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::services::{ServiceContext, StoreChange};

/// Cancels a payment attempt from another task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let cancelled = *rx.borrow_and_update();
            if cancelled {
                return;
            }
            // The sender lives in `self`, so `changed` cannot fail here
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// One attempt's id and validated state
#[derive(Debug)]
struct Attempt {
    id: Uuid,
    state: AttemptState,
}

impl Attempt {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AttemptState::Idle,
        }
    }

    fn advance(&mut self, next: AttemptState) -> ServiceResult<()> {
        let next = self.state.advance(next)?;
        debug!(attempt_id = %self.id, from = %self.state, to = %next, "attempt transition");
        self.state = next;
        Ok(())
    }

    fn finish(&mut self, request: &PaymentRequest, outcome: Outcome) -> ServiceResult<PaymentOutcome> {
        self.advance(AttemptState::done(outcome.clone()))?;
        Ok(PaymentOutcome::new(self.id, request, outcome))
    }
}

/// Settlement Coordinator - runs payment attempts against the service context
pub struct SettlementCoordinator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SettlementCoordinator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Run a full attempt: validate the amount, wait for a stable live hand on
    /// `detections`, match and settle. Always resolves to an outcome; errors
    /// are reserved for broken internal invariants.
    pub async fn run_payment(
        &self,
        request: &PaymentRequest,
        detections: &mut DetectionStream,
        cancel: &CancelHandle,
    ) -> ServiceResult<PaymentOutcome> {
        let request = self.with_counterparty(request);
        let mut attempt = Attempt::new();
        info!(
            attempt_id = %attempt.id,
            user_id = %request.user_id,
            amount = %request.amount,
            "payment attempt started"
        );

        if let Some(outcome) = self.screen(&request) {
            info!(attempt_id = %attempt.id, %outcome, "payment rejected before matching");
            return attempt.finish(&request, outcome);
        }
        if cancel.is_cancelled() {
            return attempt.finish(&request, Outcome::Cancelled);
        }
        attempt.advance(AttemptState::AwaitingDetection)?;

        let mut window = StabilityWindow::new(self.ctx.config().stability.clone());
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt_id = %attempt.id, "payment cancelled while awaiting detection");
                    return attempt.finish(&request, Outcome::Cancelled);
                }
                item = detections.next() => item,
            };

            let Some(detection) = item else {
                let outcome = if detections.stats().provider_failed() {
                    Outcome::ResourceUnavailable
                } else {
                    Outcome::NoHandDetected
                };
                info!(attempt_id = %attempt.id, %outcome, "detection feed ended");
                return attempt.finish(&request, outcome);
            };

            match window.push(detection) {
                StabilityVerdict::Stable(sample) => {
                    if let Some(outcome) = self.process(&mut attempt, &request, &sample, cancel).await? {
                        return Ok(outcome);
                    }
                }
                verdict => debug!(attempt_id = %attempt.id, ?verdict, "awaiting stable hand"),
            }
        }
    }

    /// Handle one stable detection for a fresh attempt. Returns `None` when the
    /// sample is unusable or another attempt holds the session slot.
    pub async fn on_stable_detection(
        &self,
        request: &PaymentRequest,
        detection: &Detection,
        cancel: &CancelHandle,
    ) -> ServiceResult<Option<PaymentOutcome>> {
        let request = self.with_counterparty(request);
        let mut attempt = Attempt::new();
        if let Some(outcome) = self.screen(&request) {
            debug!(attempt_id = %attempt.id, %outcome, "payment rejected before matching");
            return attempt.finish(&request, outcome).map(Some);
        }
        attempt.advance(AttemptState::AwaitingDetection)?;
        self.process(&mut attempt, &request, detection, cancel).await
    }

    async fn process(
        &self,
        attempt: &mut Attempt,
        request: &PaymentRequest,
        detection: &Detection,
        cancel: &CancelHandle,
    ) -> ServiceResult<Option<PaymentOutcome>> {
        let live = match extract(detection) {
            Ok(features) => features,
            Err(e) => {
                debug!(attempt_id = %attempt.id, error = %e, "unusable sample");
                return Ok(None);
            }
        };

        let Some(_slot) = self.ctx.gate().try_acquire(attempt.id) else {
            info!(attempt_id = %attempt.id, "stable detection ignored, another attempt in progress");
            return Ok(None);
        };

        let template = match TemplateRepo::get(self.ctx.db().pool(), &request.user_id).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                info!(attempt_id = %attempt.id, user_id = %request.user_id, "no enrolled palm");
                return self
                    .conclude(attempt, request, Outcome::NoEnrollmentFound)
                    .await
                    .map(Some);
            }
            Err(e) => {
                warn!(attempt_id = %attempt.id, error = %e, "template lookup failed");
                let outcome = Outcome::Failed {
                    reason: e.to_string(),
                };
                return self.conclude(attempt, request, outcome).await.map(Some);
            }
        };

        attempt.advance(AttemptState::Matching)?;
        let delay = self.ctx.config().processing_delay;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(attempt_id = %attempt.id, "payment cancelled while matching");
                return self.conclude(attempt, request, Outcome::Cancelled).await.map(Some);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let decision = self.ctx.matcher().decide(&live, &template);
        info!(attempt_id = %attempt.id, score = decision.score(), accepted = decision.is_accept(), "match decided");
        if !decision.is_accept() {
            let rejected = Outcome::MatchRejected {
                score: decision.score(),
            };
            return self.conclude(attempt, request, rejected).await.map(Some);
        }

        attempt.advance(AttemptState::Settling)?;
        let entry = NewScanEvent::payment_success(&request.user_id, request.amount, &request.counterparty);
        match self.ctx.db().settle(&entry).await {
            Ok(settled) => {
                self.ctx.publish_settled(&settled.event, settled.balance_after);
                let outcome = attempt.finish(request, Outcome::Success)?;
                Ok(Some(
                    outcome
                        .with_event(settled.event.id)
                        .with_balance(settled.balance_after),
                ))
            }
            Err(e) => {
                warn!(attempt_id = %attempt.id, error = %e, "settlement failed, nothing committed");
                let outcome = Outcome::Failed {
                    reason: e.to_string(),
                };
                attempt.finish(request, outcome).map(Some)
            }
        }
    }

    /// Finish the attempt, first appending the zero-amount failure entry when
    /// the outcome calls for one. If that write fails the attempt resolves to
    /// `Failed` instead.
    async fn conclude(
        &self,
        attempt: &mut Attempt,
        request: &PaymentRequest,
        outcome: Outcome,
    ) -> ServiceResult<PaymentOutcome> {
        if !outcome.records_failure() {
            return attempt.finish(request, outcome);
        }

        let entry =
            NewScanEvent::payment_failure(&request.user_id, &request.counterparty, &outcome.describe());
        let outcome = match LedgerRepo::append(self.ctx.db().pool(), &entry).await {
            Ok(event) => {
                self.ctx.publish(StoreChange::LedgerAppended {
                    event_id: event.id,
                    kind: event.kind,
                });
                outcome
            }
            Err(e) => {
                warn!(attempt_id = %attempt.id, error = %e, "failed to record payment failure");
                Outcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        attempt.finish(request, outcome)
    }

    /// Request checks that need no detection: user id, then amount
    fn screen(&self, request: &PaymentRequest) -> Option<Outcome> {
        if let Err(e) = validate_user_id(&request.user_id) {
            debug!(error = %e, "invalid user id");
            return Some(Outcome::InvalidUser);
        }
        if let Err(e) = request.currency.validate_payment(request.amount) {
            debug!(error = %e, "invalid amount");
            return Some(Outcome::InvalidAmount);
        }
        None
    }

    fn with_counterparty(&self, request: &PaymentRequest) -> PaymentRequest {
        let mut request = request.clone();
        if request.counterparty.trim().is_empty() {
            request.counterparty = self.ctx.config().default_counterparty.clone();
        }
        request
    }
}

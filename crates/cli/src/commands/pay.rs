//! Palm payment: replay a detection script through a capture session

use anyhow::{Context, Result};
use palmpay_biometrics::{CaptureSession, ScriptedProvider};
use palmpay_core::{Frame, Outcome, PaymentRequest};
use palmpay_settlement::CancelHandle;
use rust_decimal::Decimal;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::commands;
use crate::config::AppConfig;

/// Camera frame interval (about 30 fps)
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

pub async fn pay(
    config: &AppConfig,
    amount: Decimal,
    counterparty: Option<String>,
    frames_path: &Path,
) -> Result<()> {
    let provider = ScriptedProvider::from_json_file(frames_path)
        .with_context(|| format!("Failed to load detection script {:?}", frames_path))?;
    let frame_count = provider.len();
    let palmpay = commands::open(config).await?;

    // Simulated camera: one blank frame per scripted detection
    let (frame_tx, frame_rx) = mpsc::channel(8);
    let camera = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        for ts in 0..frame_count as i64 {
            ticker.tick().await;
            if frame_tx.send(Frame::blank(640, 480, ts * 33)).await.is_err() {
                break;
            }
        }
        debug!(frames = frame_count, "camera finished");
    });

    let buffer = palmpay.context().config().detection_buffer;
    let (session, mut detections) = CaptureSession::start(provider, frame_rx, buffer)
        .context("Camera unavailable")?;

    let request = PaymentRequest::new(
        &config.user_id,
        amount,
        counterparty.as_deref().unwrap_or(&config.counterparty),
    );
    let cancel = CancelHandle::new();

    println!("🖐️  Hold your palm steady...");
    // Ctrl-C only requests cancellation; a settlement already under way completes
    let payment = palmpay.start_payment(&request, &mut detections, &cancel);
    tokio::pin!(payment);
    let result = loop {
        tokio::select! {
            outcome = &mut payment => break outcome,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => cancel.cancel(),
        }
    };
    session.close().await;
    camera.abort();
    let outcome = result.context("Payment attempt failed")?;

    match &outcome.outcome {
        Outcome::Success => {
            println!("✅ Payment successful!");
            println!("   Amount:  {}", request.money());
            println!("   From:    {}", outcome.counterparty_label);
            if let Some(balance) = outcome.balance_after {
                println!("   Balance: {}", balance);
            }
        }
        Outcome::MatchRejected { score } => {
            println!("❌ Palm not recognised (score {:.3})", score);
        }
        Outcome::NoEnrollmentFound => {
            println!("❌ No palm enrolled for {}. Run 'palmpay enroll' first.", config.user_id);
        }
        other => println!("❌ Payment not completed: {}", other.describe()),
    }
    println!("   Attempt: {}", outcome.attempt_id);

    palmpay.context().db().close().await;
    Ok(())
}

//! Capture pipeline.
//!
//! A background task pulls frames, runs the landmark provider on tokio's
//! blocking pool and forwards each result over a bounded channel. The channel never blocks the camera:
//! when the consumer is busy (matching or settling) and the buffer is full,
//! the newest detection is dropped and counted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use palmpay_core::{Detection, Frame};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{BiometricResult, ProviderError};
use crate::provider::LandmarkProvider;

/// Counters shared between the capture worker and its consumers
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    provider_failed: AtomicBool,
}

impl CaptureStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn provider_failed(&self) -> bool {
        self.provider_failed.load(Ordering::SeqCst)
    }
}

/// Producer half of the detection channel.
#[derive(Debug, Clone)]
pub struct DetectionSender {
    tx: mpsc::Sender<Option<Detection>>,
    stats: Arc<CaptureStats>,
}

impl DetectionSender {
    /// Offers a detection without waiting. Returns `false` once the consumer
    /// is gone.
    pub fn offer(&self, detection: Option<Detection>) -> bool {
        match self.tx.try_send(detection) {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Marks the feed as failed because the provider became unavailable
    pub fn fail(&self) {
        self.stats.provider_failed.store(true, Ordering::SeqCst);
    }
}

/// Consumer half: the detections the coordinator reads.
#[derive(Debug)]
pub struct DetectionStream {
    rx: mpsc::Receiver<Option<Detection>>,
    stats: Arc<CaptureStats>,
}

impl DetectionStream {
    /// Bounded detection channel with drop-latest backpressure
    pub fn channel(buffer: usize) -> (DetectionSender, DetectionStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let stats = Arc::new(CaptureStats::default());
        (
            DetectionSender {
                tx,
                stats: Arc::clone(&stats),
            },
            DetectionStream { rx, stats },
        )
    }

    /// Next detection result; `None` when the feed has ended
    pub async fn next(&mut self) -> Option<Option<Detection>> {
        self.rx.recv().await
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }
}

/// A running capture worker. Closing it releases the provider.
pub struct CaptureSession {
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<CaptureStats>,
}

impl CaptureSession {
    /// Starts the worker. Fails up front when the provider is unavailable.
    pub fn start<P: LandmarkProvider>(
        provider: P,
        frames: mpsc::Receiver<Frame>,
        buffer: usize,
    ) -> BiometricResult<(Self, DetectionStream)> {
        if let Err(e) = provider.ready() {
            let mut provider = provider;
            provider.release();
            return Err(e.into());
        }

        let (sender, stream) = DetectionStream::channel(buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = Arc::clone(&sender.stats);
        let worker = tokio::spawn(run_worker(provider, frames, sender, shutdown_rx));
        info!(buffer, "capture session started");

        Ok((
            Self {
                shutdown: Some(shutdown_tx),
                worker: Some(worker),
                stats,
            },
            stream,
        ))
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Stops the worker and waits until the provider has been released
    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "capture worker did not shut down cleanly");
            }
        }
        info!(
            frames = self.stats.frames(),
            forwarded = self.stats.forwarded(),
            dropped = self.stats.dropped(),
            "capture session closed"
        );
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Dropping the sender also wakes the worker; it releases the provider
        // on its way out.
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_worker<P: LandmarkProvider>(
    mut provider: P,
    mut frames: mpsc::Receiver<Frame>,
    sender: DetectionSender,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                sender.stats.frames.fetch_add(1, Ordering::Relaxed);

                // Inference may block for a whole frame interval; keep it off
                // the async workers
                let inference = tokio::task::spawn_blocking(move || {
                    let result = provider.detect(&frame);
                    (provider, result)
                });
                let result = match inference.await {
                    Ok((returned, result)) => {
                        provider = returned;
                        result
                    }
                    Err(e) => {
                        error!(error = %e, "landmark inference panicked, provider lost");
                        sender.fail();
                        return;
                    }
                };

                let detection = match result {
                    Ok(detection) => detection,
                    Err(ProviderError::Unavailable(reason)) => {
                        warn!(%reason, "landmark provider became unavailable");
                        sender.fail();
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "frame dropped as no hand");
                        None
                    }
                };

                if !sender.offer(detection) {
                    break;
                }
            }
        }
    }
    provider.release();
    debug!("landmark provider released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::testing::open_hand;

    #[test]
    fn test_drop_latest_when_full() {
        let (sender, mut stream) = DetectionStream::channel(1);
        assert!(sender.offer(Some(open_hand())));
        assert!(sender.offer(None));
        assert_eq!(stream.stats().forwarded(), 1);
        assert_eq!(stream.stats().dropped(), 1);
        // The oldest detection survived
        assert_eq!(stream.rx.try_recv().unwrap(), Some(open_hand()));
    }

    #[test]
    fn test_offer_after_consumer_gone() {
        let (sender, stream) = DetectionStream::channel(1);
        drop(stream);
        assert!(!sender.offer(None));
    }

    #[tokio::test]
    async fn test_session_forwards_and_releases() {
        let provider = ScriptedProvider::new(vec![Some(open_hand()), None]);
        let released = provider.release_flag();
        let (frame_tx, frame_rx) = mpsc::channel(4);
        let (session, mut stream) = CaptureSession::start(provider, frame_rx, 4).unwrap();

        frame_tx.send(Frame::blank(480, 480, 1)).await.unwrap();
        frame_tx.send(Frame::blank(480, 480, 2)).await.unwrap();
        assert_eq!(stream.next().await, Some(Some(open_hand())));
        assert_eq!(stream.next().await, Some(None));

        session.close().await;
        assert!(released.load(Ordering::SeqCst));
        // Worker gone, feed ends
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_frame_source_end_closes_feed() {
        let provider = ScriptedProvider::new(vec![None]);
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (_session, mut stream) = CaptureSession::start(provider, frame_rx, 1).unwrap();
        drop(frame_tx);
        assert_eq!(stream.next().await, None);
        assert!(!stream.stats().provider_failed());
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_start() {
        let provider = ScriptedProvider::unavailable("no camera");
        let released = provider.release_flag();
        let (_tx, frame_rx) = mpsc::channel(1);
        assert!(CaptureSession::start(provider, frame_rx, 1).is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    struct PanickingProvider;

    impl LandmarkProvider for PanickingProvider {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<Detection>, ProviderError> {
            panic!("model crashed");
        }
    }

    #[tokio::test]
    async fn test_inference_panic_marks_provider_failed() {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (session, mut stream) = CaptureSession::start(PanickingProvider, frame_rx, 1).unwrap();

        frame_tx.send(Frame::blank(480, 480, 1)).await.unwrap();
        assert_eq!(stream.next().await, None);
        assert!(stream.stats().provider_failed());
        session.close().await;
    }
}

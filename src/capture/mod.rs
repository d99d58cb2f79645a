//! Capture scheduler - fixed-cadence sampling loop
//!
//! ## Responsibilities
//!
//! - Own the monitoring session and its acquired frame source
//! - Tick at a fixed cadence, independent of request latency
//! - Spawn one fire-and-forget attempt chain per tick
//! - Guard the state machine against results resolving after stop
//!
//! Each tick grabs a frame and hands it to the classifier without waiting
//! for the previous tick's chain; classification latency never stalls the
//! sampling cadence, at the cost of overlapping requests. Missed ticks are
//! fired in a burst rather than skipped, so the tick count over a session
//! depends only on its duration. `stop()` cancels only the most recent
//! chain; older in-flight chains run to completion and their late results
//! are discarded by the active-session check.

use crate::alert::AlertStateMachine;
use crate::detection::Classifier;
use crate::error::{Error, Result};
use crate::frame_source::{FrameSource, FrameSourceProvider};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Consecutive dropped chains before a staleness warning is logged
const STALE_WARN_THRESHOLD: u32 = 5;

/// One monitoring run: the acquired source plus its tick loop
struct Session {
    active: Arc<AtomicBool>,
    source: Arc<dyn FrameSource>,
    tick_task: JoinHandle<()>,
}

/// Fixed-period capture-and-submit scheduler
pub struct CaptureScheduler {
    provider: Arc<dyn FrameSourceProvider>,
    classifier: Arc<dyn Classifier>,
    alert: Arc<AlertStateMachine>,
    capture_interval: Duration,
    session: Mutex<Option<Session>>,
}

impl CaptureScheduler {
    /// Create a scheduler; nothing runs until `start`
    pub fn new(
        provider: Arc<dyn FrameSourceProvider>,
        classifier: Arc<dyn Classifier>,
        alert: Arc<AlertStateMachine>,
        capture_interval: Duration,
    ) -> Self {
        Self {
            provider,
            classifier,
            alert,
            capture_interval,
            session: Mutex::new(None),
        }
    }

    /// Acquire the frame source and start ticking.
    ///
    /// The first capture fires immediately, then one per interval. Fails
    /// with `SourceUnavailable` when the source cannot be acquired; a
    /// second `start` while active is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            tracing::warn!("Monitoring session already active");
            return Ok(());
        }

        let source: Arc<dyn FrameSource> = Arc::from(self.provider.acquire().await?);
        let active = Arc::new(AtomicBool::new(true));

        let tick_task = tokio::spawn(run_ticks(
            source.clone(),
            self.classifier.clone(),
            self.alert.clone(),
            active.clone(),
            self.capture_interval,
        ));

        *session = Some(Session {
            active,
            source,
            tick_task,
        });

        tracing::info!(
            interval_ms = self.capture_interval.as_millis() as u64,
            "Monitoring session started"
        );
        Ok(())
    }

    /// Tear the session down. Idempotent: a stop with no active session
    /// is a no-op.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let Some(s) = session.take() else {
            tracing::debug!("Stop requested with no active session");
            return;
        };

        s.active.store(false, Ordering::SeqCst);
        self.classifier.cancel_current();
        s.tick_task.abort();
        s.source.release().await;

        tracing::info!("Monitoring session stopped");
    }

    /// Whether a session is currently running
    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

/// The tick loop: one capture-and-submit per interval tick.
///
/// The default interval behavior bursts missed ticks instead of skipping
/// them, which keeps the tick count a pure function of session duration.
async fn run_ticks(
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    alert: Arc<AlertStateMachine>,
    active: Arc<AtomicBool>,
    capture_interval: Duration,
) {
    let dropped_chains = Arc::new(AtomicU32::new(0));
    let mut interval = tokio::time::interval(capture_interval);

    loop {
        interval.tick().await;
        if !active.load(Ordering::SeqCst) {
            break;
        }

        let frame = match source.current_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Frame capture failed, skipping cycle");
                continue;
            }
        };

        // The source may have been torn down while we waited for the frame
        if !active.load(Ordering::SeqCst) {
            break;
        }

        tokio::spawn(run_attempt_chain(
            classifier.clone(),
            alert.clone(),
            active.clone(),
            dropped_chains.clone(),
            frame,
        ));
    }

    tracing::debug!("Tick loop exited");
}

/// One fire-and-forget attempt chain, detached from the tick loop
async fn run_attempt_chain(
    classifier: Arc<dyn Classifier>,
    alert: Arc<AlertStateMachine>,
    active: Arc<AtomicBool>,
    dropped_chains: Arc<AtomicU32>,
    frame: image::DynamicImage,
) {
    match classifier.submit(frame, Utc::now()).await {
        Ok(result) => {
            if !active.load(Ordering::SeqCst) {
                tracing::debug!("Result arrived after stop, discarded");
                return;
            }
            dropped_chains.store(0, Ordering::SeqCst);
            alert.on_result(result);
        }
        Err(Error::Cancelled) => {
            tracing::debug!("Attempt chain cancelled");
        }
        Err(e) => {
            // Transient failures are absorbed; the next tick proceeds
            tracing::debug!(error = %e, "Attempt chain dropped");
            let dropped = dropped_chains.fetch_add(1, Ordering::SeqCst) + 1;
            if dropped == STALE_WARN_THRESHOLD {
                tracing::warn!(
                    consecutive = dropped,
                    "Repeated detection failures, alert state may be stale"
                );
            }
        }
    }
}

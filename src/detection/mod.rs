//! Detection client - classification service adapter
//!
//! ## Responsibilities
//!
//! - Downscale and JPEG-encode frames before transmission
//! - POST the encoded frame to the classification service
//! - Retry with exponential backoff on transport or parse failure
//! - Track the most recent in-flight request so a stop can cancel it
//!
//! One call to `submit` is one attempt chain: the same encoded payload is
//! reused across every retry, and the chain ends with a result, with
//! `Cancelled`, or with `RetriesExhausted`. Chains from different capture
//! ticks are independent; only the newest one holds the cancellable slot.

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use image::DynamicImage;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Verdict for one submitted frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub drowsy: bool,
    /// Confidence in [0, 1]; display-only, never gates a transition
    pub confidence: f32,
}

/// Classification seam between the capture scheduler and the wire
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Run one attempt chain for a captured frame
    async fn submit(
        &self,
        frame: DynamicImage,
        captured_at: DateTime<Utc>,
    ) -> Result<ClassificationResult>;

    /// Cancel the most recently issued request, if any
    fn cancel_current(&self);
}

/// HTTP client for the remote classification service
pub struct DetectionClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_base_delay: Duration,
    frame_width: u32,
    frame_height: u32,
    jpeg_quality: u8,
    /// Cancellation handle of the newest chain. Replacing it drops the old
    /// sender, which makes earlier chains permanently uncancellable.
    current_cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl DetectionClient {
    /// Create a new client from config
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.detection_endpoint.clone(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            frame_width: config.frame_width,
            frame_height: config.frame_height,
            jpeg_quality: config.jpeg_quality,
            current_cancel: Mutex::new(None),
        })
    }

    async fn send_once(
        &self,
        payload: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<ClassificationResult> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "image/jpeg")
            .header("x-captured-at", captured_at.to_rfc3339())
            .body(payload.to_vec())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "Detection service returned {}",
                resp.status()
            )));
        }

        let result: ClassificationResult = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        if !(0.0..=1.0).contains(&result.confidence) {
            return Err(Error::MalformedResponse(format!(
                "confidence {} out of range",
                result.confidence
            )));
        }

        Ok(result)
    }
}

#[async_trait]
impl Classifier for DetectionClient {
    async fn submit(
        &self,
        frame: DynamicImage,
        captured_at: DateTime<Utc>,
    ) -> Result<ClassificationResult> {
        let payload = encode_frame(
            &frame,
            self.frame_width,
            self.frame_height,
            self.jpeg_quality,
        )?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut slot = self.current_cancel.lock().unwrap();
            *slot = Some(cancel_tx);
        }

        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = cancelled(cancel_rx.clone()) => {
                    tracing::debug!("Detection request cancelled");
                    return Err(Error::Cancelled);
                }
                res = self.send_once(&payload, captured_at) => match res {
                    Ok(result) => {
                        tracing::debug!(
                            drowsy = result.drowsy,
                            confidence = result.confidence,
                            attempt = attempt,
                            "Classification received"
                        );
                        return Ok(result);
                    }
                    Err(e) => {
                        if attempt >= self.max_retries {
                            tracing::debug!(
                                error = %e,
                                attempts = attempt + 1,
                                "Attempt chain exhausted, dropping frame"
                            );
                            return Err(Error::RetriesExhausted {
                                attempts: attempt + 1,
                            });
                        }

                        let delay = backoff_delay(self.retry_base_delay, attempt);
                        tracing::debug!(
                            error = %e,
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Detection attempt failed, retrying"
                        );

                        tokio::select! {
                            _ = cancelled(cancel_rx.clone()) => {
                                tracing::debug!("Detection request cancelled during backoff");
                                return Err(Error::Cancelled);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }

    fn cancel_current(&self) {
        if let Some(tx) = self.current_cancel.lock().unwrap().take() {
            let _ = tx.send(true);
        }
    }
}

/// Resolves once the chain's cancellation flag is raised.
///
/// A dropped sender means the chain was superseded by a newer one, not
/// cancelled; in that case this future never resolves.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Backoff delay before retry number `retry_count` (0-based)
pub(crate) fn backoff_delay(base: Duration, retry_count: u32) -> Duration {
    base * 2u32.saturating_pow(retry_count)
}

/// Downscale the frame and encode it as lossy JPEG for transmission
pub(crate) fn encode_frame(
    frame: &DynamicImage,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>> {
    let resized = frame
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    resized.write_with_encoder(encoder)?;

    Ok(buf)
}

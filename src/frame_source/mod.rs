//! Frame source abstraction
//!
//! ## Responsibilities
//!
//! - Hand out one still image per request from a live video feed
//! - Distinguish acquisition failures by remedy (permission / no device / unknown)
//! - HTTP snapshot implementation for IP cameras exposing a still-image URL
//!
//! The capture scheduler owns exactly one acquired source per session and is
//! the only component allowed to acquire or release it.

use crate::error::{Error, Result, SourceErrorKind};
use async_trait::async_trait;
use image::DynamicImage;
use std::time::Duration;

/// A live video feed that can produce one decoded still image on demand
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab the current frame
    async fn current_frame(&self) -> Result<DynamicImage>;

    /// Release the underlying device. Called once on session teardown.
    async fn release(&self) {}
}

/// Acquires a [`FrameSource`], validating that it actually produces frames
#[async_trait]
pub trait FrameSourceProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn FrameSource>>;
}

/// Frame source backed by an HTTP snapshot URL (IP camera style)
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    async fn fetch(&self) -> Result<DynamicImage> {
        let resp = self.client.get(&self.url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "Snapshot HTTP error: {}",
                resp.status()
            )));
        }

        let bytes = resp.bytes().await?;
        let frame = image::load_from_memory(&bytes)?;
        Ok(frame)
    }
}

#[async_trait]
impl FrameSource for HttpSnapshotSource {
    async fn current_frame(&self) -> Result<DynamicImage> {
        self.fetch().await
    }

    async fn release(&self) {
        tracing::debug!(url = %self.url, "Frame source released");
    }
}

/// Provider for [`HttpSnapshotSource`]
///
/// `acquire` probes the URL with a single fetch so that a session refuses to
/// start against a camera that is absent or refusing us, with the failure
/// kind mapped from the HTTP outcome.
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotProvider {
    /// Create a provider for the given snapshot URL
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FrameSourceProvider for HttpSnapshotProvider {
    async fn acquire(&self) -> Result<Box<dyn FrameSource>> {
        let source = HttpSnapshotSource::new(self.client.clone(), self.url.clone());

        // Probe once so start() fails fast with a meaningful kind
        match source.current_frame().await {
            Ok(frame) => {
                tracing::info!(
                    url = %self.url,
                    width = frame.width(),
                    height = frame.height(),
                    "Frame source acquired"
                );
                Ok(Box::new(source))
            }
            Err(Error::Http(e)) if e.is_connect() || e.is_timeout() => Err(
                Error::source_unavailable(SourceErrorKind::DeviceNotFound, e.to_string()),
            ),
            Err(Error::Transport(msg)) => {
                let kind = if msg.contains("401") || msg.contains("403") {
                    SourceErrorKind::PermissionDenied
                } else if msg.contains("404") {
                    SourceErrorKind::DeviceNotFound
                } else {
                    SourceErrorKind::Unknown
                };
                Err(Error::source_unavailable(kind, msg))
            }
            Err(e) => Err(Error::source_unavailable(
                SourceErrorKind::Unknown,
                e.to_string(),
            )),
        }
    }
}

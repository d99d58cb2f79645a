//! End-to-end pipeline test against a stub camera and classification service
//!
//! Runs the real capture scheduler, HTTP frame source and detection client
//! against a local axum server that plays both roles: first it reports the
//! driver as drowsy, then as alert, and the monitor status must follow.

use axum::routing::{get, post};
use axum::Router;
use drowsyguard::alert::{AlertState, AlertStateMachine};
use drowsyguard::capture::CaptureScheduler;
use drowsyguard::config::MonitorConfig;
use drowsyguard::detection::DetectionClient;
use drowsyguard::error::{Error, SourceErrorKind};
use drowsyguard::frame_source::HttpSnapshotProvider;
use image::{DynamicImage, RgbImage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn snapshot_jpeg() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, image::Rgb([90, 90, 90])));
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85);
    img.to_rgb8().write_with_encoder(encoder).unwrap();
    buf
}

/// Stub serving /snapshot.jpg and /detect; drowsy for the first
/// `drowsy_responses` detect calls, alert afterwards
async fn spawn_stub(drowsy_responses: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let detect_calls = Arc::new(AtomicUsize::new(0));
    let calls = detect_calls.clone();
    let jpeg = snapshot_jpeg();

    let router = Router::new()
        .route(
            "/snapshot.jpg",
            get(move || {
                let jpeg = jpeg.clone();
                async move { ([("content-type", "image/jpeg")], jpeg) }
            }),
        )
        .route(
            "/detect",
            post(move || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    let drowsy = n < drowsy_responses;
                    axum::Json(serde_json::json!({
                        "drowsy": drowsy,
                        "confidence": if drowsy { 0.91 } else { 0.12 },
                    }))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, detect_calls)
}

fn pipeline_config(addr: SocketAddr) -> MonitorConfig {
    MonitorConfig {
        detection_endpoint: format!("http://{}/detect", addr),
        snapshot_url: format!("http://{}/snapshot.jpg", addr),
        capture_interval_ms: 150,
        max_retries: 2,
        retry_base_delay_ms: 50,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn full_pipeline_raises_and_clears_warning() {
    let (addr, detect_calls) = spawn_stub(3).await;
    let config = pipeline_config(addr);

    let alert = Arc::new(AlertStateMachine::new(None, true));
    let classifier = Arc::new(DetectionClient::new(&config).unwrap());
    let provider = Arc::new(HttpSnapshotProvider::new(config.snapshot_url.clone()).unwrap());
    let scheduler = Arc::new(CaptureScheduler::new(
        provider,
        classifier,
        alert.clone(),
        config.capture_interval(),
    ));

    let mut status_rx = alert.subscribe();

    scheduler.start().await.unwrap();

    // Drowsy responses raise the warning...
    let raised = tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.alert == AlertState::Warning),
    )
    .await
    .expect("warning never raised")
    .unwrap()
    .clone();
    assert!(raised.warning_visible);
    assert_eq!(raised.confidence, Some(0.91));

    // ...and the first alert response clears it again.
    let cleared = tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.alert == AlertState::Normal && s.confidence == Some(0.12)),
    )
    .await
    .expect("warning never cleared")
    .unwrap()
    .clone();
    assert!(!cleared.warning_visible);
    assert!(cleared.last_result_at.is_some());

    scheduler.stop().await;
    assert!(!scheduler.is_active().await);

    // Stopping again is a no-op, and no further requests go out once
    // in-flight chains have drained
    scheduler.stop().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = detect_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(detect_calls.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn start_fails_when_camera_is_unreachable() {
    // Bind then drop a listener so the port is closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = pipeline_config(addr);
    let alert = Arc::new(AlertStateMachine::new(None, true));
    let classifier = Arc::new(DetectionClient::new(&config).unwrap());
    let provider = Arc::new(HttpSnapshotProvider::new(config.snapshot_url.clone()).unwrap());
    let scheduler = CaptureScheduler::new(
        provider,
        classifier,
        alert,
        config.capture_interval(),
    );

    match scheduler.start().await {
        Err(Error::SourceUnavailable { kind, .. }) => {
            assert_eq!(kind, SourceErrorKind::DeviceNotFound)
        }
        Ok(()) => panic!("start unexpectedly succeeded"),
        Err(e) => panic!("unexpected error: {e}"),
    }
    assert!(!scheduler.is_active().await);
}

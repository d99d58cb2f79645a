//! Drowsyguard - drowsiness monitoring client
//!
//! Main entry point: wires the capture scheduler, detection client, alert
//! state machine and alarm together, runs until interrupted.

use drowsyguard::{
    alarm::{AlarmScheduler, RodioSink},
    alert::AlertStateMachine,
    capture::CaptureScheduler,
    config::MonitorConfig,
    detection::DetectionClient,
    frame_source::HttpSnapshotProvider,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drowsyguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting drowsyguard v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = MonitorConfig::default();
    tracing::info!(
        detection_endpoint = %config.detection_endpoint,
        snapshot_url = %config.snapshot_url,
        capture_interval_ms = config.capture_interval_ms,
        max_retries = config.max_retries,
        "Configuration loaded"
    );

    // Audio is optional: the visual warning works without it
    let alarm = match RodioSink::try_new() {
        Ok(sink) => Some(Arc::new(AlarmScheduler::new(Arc::new(sink)))),
        Err(e) => {
            tracing::warn!(error = %e, "Audio unavailable, alarm disabled");
            None
        }
    };

    let alert = Arc::new(AlertStateMachine::new(
        alarm.clone(),
        config.alarm_enabled_by_default,
    ));
    let detection_client = Arc::new(DetectionClient::new(&config)?);
    let provider = Arc::new(HttpSnapshotProvider::new(config.snapshot_url.clone())?);

    let scheduler = Arc::new(CaptureScheduler::new(
        provider,
        detection_client,
        alert.clone(),
        config.capture_interval(),
    ));

    // Log status snapshots for the operator; a UI would subscribe the same way
    let mut status_rx = alert.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            tracing::info!(
                alert = ?status.alert,
                warning_visible = status.warning_visible,
                confidence = ?status.confidence,
                alarm_armed = status.alarm_armed,
                "Status updated"
            );
        }
    });

    scheduler.start().await?;
    tracing::info!("Monitoring active - press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    scheduler.stop().await;
    alert.shutdown();

    Ok(())
}

//! Alert state machine
//!
//! ## Responsibilities
//!
//! - Serialize asynchronous classification results into state transitions
//! - Raise/clear the visual warning and arm/silence the alarm at the edges
//! - Publish a status snapshot for the UI layer over a watch channel
//!
//! Results are applied in arrival order, last-arrival-wins: requests from
//! different capture ticks may finish out of capture order (especially
//! across retries) and no reordering or sequence tracking is attempted.
//! Transitions fire on a single frame's verdict; there is no multi-frame
//! debouncing. Both are deliberate simplicity trade-offs.
//!
//! Alarm arming happens only at the Normal -> Warning edge. The enable
//! toggle gates that edge and nothing else: disabling never retroactively
//! silences an armed alarm, enabling mid-Warning never arms one.

use crate::alarm::AlarmScheduler;
use crate::detection::ClassificationResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Binary alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Normal,
    Warning,
}

/// Snapshot published to the UI layer after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub alert: AlertState,
    /// Whether the warning banner should be shown (dismissable)
    pub warning_visible: bool,
    /// Confidence of the most recent result, display-only
    pub confidence: Option<f32>,
    pub alarm_armed: bool,
    pub alarm_enabled: bool,
    /// When the last classification result arrived; lets a UI show staleness
    pub last_result_at: Option<DateTime<Utc>>,
}

struct Inner {
    state: AlertState,
    warning_visible: bool,
    alarm_enabled: bool,
    confidence: Option<f32>,
    last_result_at: Option<DateTime<Utc>>,
}

/// Consumes classification results and drives the warning/alarm pair
pub struct AlertStateMachine {
    inner: Mutex<Inner>,
    alarm: Option<Arc<AlarmScheduler>>,
    status_tx: watch::Sender<MonitorStatus>,
}

impl AlertStateMachine {
    /// Create the machine in `Normal`.
    ///
    /// `alarm` is `None` when audio is unavailable; the visual warning
    /// still functions.
    pub fn new(alarm: Option<Arc<AlarmScheduler>>, alarm_enabled: bool) -> Self {
        let initial = MonitorStatus {
            alert: AlertState::Normal,
            warning_visible: false,
            confidence: None,
            alarm_armed: false,
            alarm_enabled,
            last_result_at: None,
        };
        let (status_tx, _) = watch::channel(initial);

        Self {
            inner: Mutex::new(Inner {
                state: AlertState::Normal,
                warning_visible: false,
                alarm_enabled,
                confidence: None,
                last_result_at: None,
            }),
            alarm,
            status_tx,
        }
    }

    /// Apply one classification result
    pub fn on_result(&self, result: ClassificationResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.confidence = Some(result.confidence);
        inner.last_result_at = Some(Utc::now());

        match (inner.state, result.drowsy) {
            (AlertState::Normal, true) => {
                inner.state = AlertState::Warning;
                inner.warning_visible = true;
                tracing::warn!(confidence = result.confidence, "Drowsiness detected");

                if inner.alarm_enabled {
                    if let Some(alarm) = &self.alarm {
                        alarm.arm();
                    }
                }
            }
            (AlertState::Warning, false) => {
                inner.state = AlertState::Normal;
                inner.warning_visible = false;
                tracing::info!(confidence = result.confidence, "Driver alert again");

                if let Some(alarm) = &self.alarm {
                    alarm.silence();
                }
            }
            (AlertState::Warning, true) => {
                // No transition, but a dismissed banner comes back
                if !inner.warning_visible {
                    inner.warning_visible = true;
                    tracing::debug!("Warning banner re-raised after dismissal");
                }
            }
            (AlertState::Normal, false) => {}
        }

        self.publish(&inner);
    }

    /// Hide the warning banner without touching state or alarm
    pub fn dismiss_warning(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.warning_visible {
            inner.warning_visible = false;
            tracing::debug!("Warning dismissed");
            self.publish(&inner);
        }
    }

    /// Toggle whether future Normal -> Warning transitions arm the alarm
    pub fn set_alarm_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.alarm_enabled = enabled;
        tracing::debug!(enabled = enabled, "Alarm enable toggled");
        self.publish(&inner);
    }

    /// Current alert state
    pub fn state(&self) -> AlertState {
        self.inner.lock().unwrap().state
    }

    /// Subscribe to status snapshots
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Silence the alarm on shutdown regardless of state
    pub fn shutdown(&self) {
        let inner = self.inner.lock().unwrap();
        if let Some(alarm) = &self.alarm {
            alarm.silence();
        }
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        let alarm_armed = self
            .alarm
            .as_ref()
            .map(|a| a.is_armed())
            .unwrap_or(false);

        self.status_tx.send_replace(MonitorStatus {
            alert: inner.state,
            warning_visible: inner.warning_visible,
            confidence: inner.confidence,
            alarm_armed,
            alarm_enabled: inner.alarm_enabled,
            last_result_at: inner.last_result_at,
        });
    }
}

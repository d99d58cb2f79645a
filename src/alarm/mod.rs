//! Alarm scheduler - repeating two-tone warning
//!
//! ## Responsibilities
//!
//! - Emit a repeating two-tone pattern while armed
//! - Guarantee at most one active tone loop (arm is a no-op when armed)
//! - Stop deterministically on silence: scheduled tones re-check the armed
//!   flag right before sounding; tones already playing finish their decay
//!
//! The loop is a cancellable repeating task. Each arm bumps a generation
//! counter and every loop iteration re-reads it, so a silence (or a
//! subsequent re-arm) invalidates any still-sleeping iteration instead of
//! leaving a stray timer behind. The cadence is loop-start-relative: the
//! next iteration begins `LOOP_PERIOD` after the current one started, not
//! after its tones finished.

mod sink;

pub use sink::RodioSink;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Mono sample rate for synthesized tones
pub const SAMPLE_RATE: u32 = 44_100;

/// First tone of the pattern
const TONE_LOW_HZ: f32 = 800.0;
/// Second tone of the pattern
const TONE_HIGH_HZ: f32 = 1000.0;
/// Length of each tone
const TONE_DURATION: Duration = Duration::from_millis(300);
/// Offset of the second tone from the start of the iteration
const TONE_SPACING: Duration = Duration::from_millis(400);
/// Time between iteration starts
const LOOP_PERIOD: Duration = Duration::from_millis(1000);

/// Plays a synthesized tone without blocking the caller
pub trait ToneSink: Send + Sync {
    fn play(&self, samples: &[f32]);
}

/// Self-rescheduling two-tone alarm
pub struct AlarmScheduler {
    sink: Arc<dyn ToneSink>,
    armed: Arc<AtomicBool>,
    /// Bumped on every arm and silence; loop iterations exit when it moves
    generation: Arc<AtomicU64>,
    tone_low: Arc<Vec<f32>>,
    tone_high: Arc<Vec<f32>>,
}

impl AlarmScheduler {
    /// Create a scheduler over the given sink
    pub fn new(sink: Arc<dyn ToneSink>) -> Self {
        Self {
            sink,
            armed: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            tone_low: Arc::new(synthesize_tone(TONE_LOW_HZ, TONE_DURATION, SAMPLE_RATE)),
            tone_high: Arc::new(synthesize_tone(TONE_HIGH_HZ, TONE_DURATION, SAMPLE_RATE)),
        }
    }

    /// Start the tone loop. No-op if already armed.
    pub fn arm(&self) {
        if self.armed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Alarm already armed");
            return;
        }

        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Alarm armed");

        let armed = self.armed.clone();
        let generation = self.generation.clone();
        let sink = self.sink.clone();
        let tone_low = self.tone_low.clone();
        let tone_high = self.tone_high.clone();

        tokio::spawn(async move {
            loop {
                let iteration_start = Instant::now();

                if !armed.load(Ordering::SeqCst) || generation.load(Ordering::SeqCst) != gen {
                    break;
                }
                sink.play(&tone_low);

                tokio::time::sleep(TONE_SPACING).await;

                if !armed.load(Ordering::SeqCst) || generation.load(Ordering::SeqCst) != gen {
                    break;
                }
                sink.play(&tone_high);

                tokio::time::sleep_until(iteration_start + LOOP_PERIOD).await;
            }
            tracing::debug!("Alarm tone loop exited");
        });
    }

    /// Flip the armed flag off; any sleeping iteration skips itself
    pub fn silence(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Alarm silenced");
        }
    }

    /// Whether the tone loop is currently armed
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Count of arm/silence transitions, for transition-edge assertions
    pub(crate) fn cycles(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Synthesize a sine tone with a linear attack and decay envelope
/// so playback starts and ends without clicks
pub fn synthesize_tone(freq_hz: f32, duration: Duration, sample_rate: u32) -> Vec<f32> {
    const PEAK: f32 = 0.4;
    let attack_samples = (0.015 * sample_rate as f32) as usize;
    let decay_samples = (0.050 * sample_rate as f32) as usize;

    let total = (duration.as_secs_f32() * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(total);

    for i in 0..total {
        let t = i as f32 / sample_rate as f32;
        let mut s = (2.0 * std::f32::consts::PI * freq_hz * t).sin() * PEAK;

        if i < attack_samples {
            s *= i as f32 / attack_samples as f32;
        }
        let remaining = total - i;
        if remaining < decay_samples {
            s *= remaining as f32 / decay_samples as f32;
        }

        samples.push(s);
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSink {
        plays: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                plays: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.plays.load(Ordering::SeqCst)
        }
    }

    impl ToneSink for CountingSink {
        fn play(&self, _samples: &[f32]) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_tone_pattern_fits_loop_period() {
        // Second tone must finish before the next iteration starts,
        // and each tone must end before the next event in the pattern.
        assert!(TONE_DURATION <= TONE_SPACING);
        assert!(TONE_SPACING + TONE_DURATION <= LOOP_PERIOD);
    }

    #[test]
    fn test_synthesized_tone_shape() {
        let samples = synthesize_tone(800.0, Duration::from_millis(300), SAMPLE_RATE);
        assert_eq!(samples.len(), 13_230);

        // Envelope: silent start, near-silent end, bounded amplitude
        assert_eq!(samples[0], 0.0);
        assert!(samples.last().unwrap().abs() < 0.05);
        assert!(samples.iter().all(|s| s.abs() <= 0.4 + 1e-4));
        assert!(samples.iter().any(|s| s.abs() > 0.3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_arm_runs_single_loop() {
        let sink = CountingSink::new();
        let alarm = AlarmScheduler::new(sink.clone());

        alarm.arm();
        alarm.arm();
        assert!(alarm.is_armed());

        // Iterations start at 0ms, 1000ms, 2000ms; two tones each.
        // A stacked second loop would double this.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(sink.count(), 6);

        alarm.silence();
        assert!(!alarm.is_armed());

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(sink.count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_skips_pending_second_tone() {
        let sink = CountingSink::new();
        let alarm = AlarmScheduler::new(sink.clone());

        alarm.arm();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.count(), 1);

        alarm.silence();

        // The 400ms second tone and all later iterations are skipped
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_silence_starts_fresh_loop() {
        let sink = CountingSink::new();
        let alarm = AlarmScheduler::new(sink.clone());

        alarm.arm();
        tokio::time::sleep(Duration::from_millis(500)).await;
        alarm.silence();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let after_first = sink.count();
        assert_eq!(after_first, 2);

        alarm.arm();
        assert!(alarm.is_armed());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.count(), after_first + 2);
    }
}

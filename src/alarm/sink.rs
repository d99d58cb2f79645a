//! Audio output via rodio
//!
//! The rodio `OutputStream` is not `Send`, so a dedicated thread owns the
//! device and plays whatever samples are handed to it over a channel. The
//! sink queues tones without blocking the alarm loop.

use super::{ToneSink, SAMPLE_RATE};
use crate::error::{Error, Result};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::sync::mpsc;

/// Tone sink backed by the default audio output device
pub struct RodioSink {
    tx: mpsc::Sender<Vec<f32>>,
}

impl RodioSink {
    /// Open the default output device.
    ///
    /// Fails with `AudioUnavailable` when the host has no audio capability;
    /// callers are expected to continue without sound.
    pub fn try_new() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let (init_tx, init_rx) = mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(Error::AudioUnavailable(e.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(Error::AudioUnavailable(e.to_string())));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));

                // Thread (and the output stream with it) lives until every
                // sender is dropped
                while let Ok(samples) = rx.recv() {
                    sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
                }
            })?;

        init_rx
            .recv()
            .map_err(|_| Error::AudioUnavailable("audio thread exited during init".to_string()))??;

        tracing::info!("Audio output ready");
        Ok(Self { tx })
    }
}

impl ToneSink for RodioSink {
    fn play(&self, samples: &[f32]) {
        if self.tx.send(samples.to_vec()).is_err() {
            tracing::warn!("Audio thread gone, tone dropped");
        }
    }
}

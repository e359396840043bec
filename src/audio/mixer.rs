//! Audio output and mixing
//!
//! The mixer owns exactly one output device. `rodio::OutputStream` is not
//! `Send`, so a dedicated audio thread owns it and playbacks are shipped
//! over a channel; initialisation happens lazily on the first play and is
//! idempotent under concurrent invocation. Concurrent playbacks are summed
//! by the output mixer, so overlapping keystrokes are all audible.

use super::effects::{self, BoxedSource, EffectsConfig};
use super::{AudioBuffer, BufferSource};
use crate::error::AudioError;
use parking_lot::Mutex;
use rodio::OutputStream;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

/// Non-blocking playback of decoded buffers with a per-call effect snapshot.
pub trait AudioPlayer: Send + Sync {
    /// Schedules the buffer for playback with the given effects. Returns
    /// before the audio finishes; concurrent calls are mixed together.
    fn play(&self, buffer: Arc<AudioBuffer>, effects: EffectsConfig) -> Result<(), AudioError>;
}

/// rodio-backed [`AudioPlayer`].
pub struct RodioPlayer {
    sender: Mutex<Option<Sender<BoxedSource>>>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Starts the audio thread on first use; later calls reuse it. Holding
    /// the lock across the handshake keeps concurrent first plays from
    /// racing the device init.
    fn ensure_started(&self) -> Result<Sender<BoxedSource>, AudioError> {
        let mut guard = self.sender.lock();
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = std::sync::mpsc::channel::<BoxedSource>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("thock-audio".to_string())
            .spawn(move || audio_output_thread(rx, ready_tx))
            .map_err(|e| AudioError::OutputDevice(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::OutputDevice("audio thread died during init".to_string()))??;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, buffer: Arc<AudioBuffer>, effects: EffectsConfig) -> Result<(), AudioError> {
        let tx = self.ensure_started()?;
        let source = effects::apply(&effects, BufferSource::new(buffer), &mut rand::thread_rng());
        tx.send(source)
            .map_err(|_| AudioError::Playback("audio output thread terminated".to_string()))
    }
}

/// Owns the output stream for the process lifetime and feeds it playbacks.
fn audio_output_thread(
    rx: Receiver<BoxedSource>,
    ready_tx: Sender<Result<(), AudioError>>,
) {
    let (stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::OutputDevice(e.to_string())));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    for source in rx {
        if let Err(e) = handle.play_raw(source) {
            tracing::warn!(error = %e, "failed to schedule playback");
        }
    }

    // Channel closed: all player handles dropped, release the device.
    drop(stream);
}

//! Audio decoding, caching, effects and playback
//!
//! All audio is decoded up front into interleaved stereo f32 buffers at the
//! fixed engine sample rate, so the playback path never resamples. Buffers
//! are shared (`Arc`) between the cache and any number of in-flight
//! playbacks; a playback holds a cheap streamer view over the buffer.

pub mod effects;
pub mod library;
pub mod mixer;

use crate::error::AudioError;
use rodio::Source;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Engine sample rate. Every buffer and the mixer run at this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Engine channel count (stereo).
pub const CHANNELS: u16 = 2;

/// Output buffer duration target (latency vs underrun compromise).
pub const BUFFER_DURATION: Duration = Duration::from_millis(100);

/// The format of an audio file, selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Returns the audio format for a file path (extension, case-insensitive).
    pub fn for_path(path: &Path) -> Result<Self, AudioError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(AudioError::UnsupportedFormat(format!(".{ext}"))),
        }
    }
}

/// A decoded audio file: interleaved stereo f32 PCM at [`SAMPLE_RATE`].
/// Immutable after creation and shared by concurrent playbacks.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
}

impl AudioBuffer {
    pub(crate) fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Length in frames (sample pairs).
    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(SAMPLE_RATE))
    }
}

/// A fresh streamer view over a shared buffer. Each playback gets its own.
pub struct BufferSource {
    buffer: Arc<AudioBuffer>,
    pos: usize,
}

impl BufferSource {
    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self { buffer, pos: 0 }
    }
}

impl Iterator for BufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.buffer.samples.get(self.pos).copied()?;
        self.pos += 1;
        Some(sample)
    }
}

impl Source for BufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.buffer.samples.len() - self.pos)
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.buffer.duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_for_path() {
        assert_eq!(
            AudioFormat::for_path(&PathBuf::from("a.mp3")).unwrap(),
            AudioFormat::Mp3
        );
        assert_eq!(
            AudioFormat::for_path(&PathBuf::from("a.WAV")).unwrap(),
            AudioFormat::Wav
        );
        assert!(AudioFormat::for_path(&PathBuf::from("a.ogg")).is_err());
        assert!(AudioFormat::for_path(&PathBuf::from("noext")).is_err());
    }

    #[test]
    fn test_buffer_source_streams_all_samples() {
        let buffer = Arc::new(AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4]));
        let collected: Vec<f32> = BufferSource::new(buffer.clone()).collect();
        assert_eq!(collected, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buffer.frames(), 2);
    }

    #[test]
    fn test_concurrent_views_are_independent() {
        let buffer = Arc::new(AudioBuffer::new(vec![1.0, 2.0]));
        let mut a = BufferSource::new(buffer.clone());
        let mut b = BufferSource::new(buffer);
        assert_eq!(a.next(), Some(1.0));
        assert_eq!(b.next(), Some(1.0));
        assert_eq!(a.next(), Some(2.0));
        assert_eq!(b.next(), Some(2.0));
    }
}

//! On-demand decode cache
//!
//! Decodes whole files to PCM and holds them in memory keyed by canonical
//! path. Files whose native rate or channel count differ from the engine's
//! are converted at ingest.

use super::{AudioBuffer, AudioFormat, CHANNELS, SAMPLE_RATE};
use crate::error::AudioError;
use parking_lot::RwLock;
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decode cache keyed by canonical file path.
pub struct AudioLibrary {
    cache: RwLock<HashMap<PathBuf, Arc<AudioBuffer>>>,
}

impl AudioLibrary {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the decoded buffer for `path`, decoding and caching it on
    /// first use. Decode failures carry the offending path; a failed decode
    /// is never silently substituted.
    pub fn load(&self, path: &Path) -> Result<Arc<AudioBuffer>, AudioError> {
        // Reject unsupported extensions before touching the filesystem.
        AudioFormat::for_path(path)?;

        let canonical = path.canonicalize().map_err(|e| AudioError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(buffer) = self.cache.read().get(&canonical) {
            return Ok(buffer.clone());
        }

        let buffer = Arc::new(decode_file(&canonical)?);
        self.cache
            .write()
            .insert(canonical, buffer.clone());
        Ok(buffer)
    }

    /// Number of cached buffers.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl Default for AudioLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a whole file to engine-format PCM.
fn decode_file(path: &Path) -> Result<AudioBuffer, AudioError> {
    let file = File::open(path).map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    // Convert channel count and sample rate at ingest so playback never has to.
    let converted: UniformSourceIterator<_, f32> =
        UniformSourceIterator::new(decoder.convert_samples::<f32>(), CHANNELS, SAMPLE_RATE);
    let samples: Vec<f32> = converted.collect();

    if samples.is_empty() {
        return Err(AudioError::Decode {
            path: path.to_path_buf(),
            reason: "decoded to zero samples".to_string(),
        });
    }

    Ok(AudioBuffer::new(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_wav(path: &Path, sample_rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            writer.write_sample((sample * 16000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_wav_converts_to_engine_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 22_050, 2205);

        let library = AudioLibrary::new();
        let buffer = library.load(&path).unwrap();

        // Mono 22.05kHz in, stereo 44.1kHz out: ~0.1s of audio either way.
        let duration = buffer.duration().as_secs_f64();
        assert!((duration - 0.1).abs() < 0.01, "duration was {duration}");
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 44_100, 441);

        let library = AudioLibrary::new();
        let first = library.load(&path).unwrap();
        let second = library.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.flac");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not audio")
            .unwrap();

        let library = AudioLibrary::new();
        assert!(matches!(
            library.load(&path),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_failure_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"definitely not a wav")
            .unwrap();

        let library = AudioLibrary::new();
        match library.load(&path) {
            Err(AudioError::Decode { path: p, .. }) => {
                assert!(p.ends_with("broken.wav"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}

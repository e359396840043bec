//! Pitch-shift effect
//!
//! Draws a semitone offset uniformly from the configured range and shifts
//! pitch by resampling: the playback rate ratio for `s` semitones is
//! `2^(s/12)`. The stream is converted back to the engine rate immediately
//! so downstream stages always see engine-format samples.

use super::BoxedSource;
use crate::audio::{CHANNELS, SAMPLE_RATE};
use rand::Rng;
use rodio::source::UniformSourceIterator;
use rodio::Source;

/// Pitch-shift range in semitones, `[lower, upper]`.
#[derive(Debug, Clone, Copy)]
pub struct PitchConfig {
    pub semitones: [f64; 2],
}

pub(super) fn apply<R: Rng>(source: BoxedSource, config: &PitchConfig, rng: &mut R) -> BoxedSource {
    let lower = config.semitones[0];
    let upper = config.semitones[1];
    let semitones = if upper > lower {
        rng.gen_range(lower..=upper)
    } else {
        lower
    };

    let ratio = semitone_ratio(semitones);
    let shifted = source.speed(ratio as f32);
    let normalized: UniformSourceIterator<_, f32> =
        UniformSourceIterator::new(shifted, CHANNELS, SAMPLE_RATE);
    Box::new(normalized)
}

/// Playback-rate ratio for a semitone offset: `2^(s/12)`.
pub(super) fn semitone_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}

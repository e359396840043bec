//! 10-band peaking equalizer
//!
//! Fixed center frequencies and bandwidths; per-band boost/cut in dB.
//! Bands with exactly 0 dB gain are omitted from the section chain - the
//! section math divides by `G - GB` and a flat band would make that zero.
//! Bandwidth gain is half the boost/cut (`GB = G/2`), reference gain is
//! unity (`G0 = 0` dB).

use super::BoxedSource;
use crate::audio::SAMPLE_RATE;
use rodio::Source;
use std::f64::consts::PI;
use std::time::Duration;

/// Per-band boost/cut in dB. Zero leaves the band untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EqualizerConfig {
    pub hz60: f64,
    pub hz170: f64,
    pub hz310: f64,
    pub hz600: f64,
    pub hz1k: f64,
    pub hz3k: f64,
    pub hz6k: f64,
    pub hz12k: f64,
    pub hz14k: f64,
    pub hz16k: f64,
}

/// (center frequency, bandwidth) in Hz for each band.
const BANDS: [(f64, f64); 10] = [
    (60.0, 40.0),
    (170.0, 100.0),
    (310.0, 180.0),
    (600.0, 350.0),
    (1000.0, 600.0),
    (3000.0, 1800.0),
    (6000.0, 3500.0),
    (12000.0, 4000.0),
    (14000.0, 3000.0),
    (16000.0, 3000.0),
];

impl EqualizerConfig {
    fn gains(&self) -> [f64; 10] {
        [
            self.hz60, self.hz170, self.hz310, self.hz600, self.hz1k, self.hz3k, self.hz6k,
            self.hz12k, self.hz14k, self.hz16k,
        ]
    }
}

pub(super) fn apply(source: BoxedSource, config: &EqualizerConfig) -> BoxedSource {
    let sections = build_sections(config);
    if sections.is_empty() {
        return source;
    }
    Box::new(Equalizer::new(source, sections))
}

pub(super) fn build_sections(config: &EqualizerConfig) -> Vec<Section> {
    config
        .gains()
        .iter()
        .zip(BANDS.iter())
        .filter(|(gain, _)| **gain != 0.0)
        .map(|(gain, (f0, bf))| Section::peaking(*f0, *bf, *gain, f64::from(SAMPLE_RATE)))
        .collect()
}

/// One second-order peaking section (direct form I biquad).
#[derive(Debug, Clone, Copy)]
pub(super) struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// Peaking filter from center frequency, bandwidth (Hz) and gain (dB),
    /// with `GB = G/2` and unity reference gain.
    fn peaking(f0: f64, bf: f64, gain_db: f64, rate: f64) -> Self {
        let w0 = 2.0 * PI * f0 / rate;
        let dw = 2.0 * PI * bf / rate;

        let g = 10f64.powf(gain_db / 20.0);
        let gb = 10f64.powf(gain_db / 2.0 / 20.0);
        let g0 = 1.0;

        let beta = (dw / 2.0).tan() * ((gb * gb - g0 * g0).abs()).sqrt()
            / ((g * g - gb * gb).abs()).sqrt();

        let denom = 1.0 + beta;
        Self {
            b0: (g0 + g * beta) / denom,
            b1: -2.0 * g0 * w0.cos() / denom,
            b2: (g0 - g * beta) / denom,
            a1: -2.0 * w0.cos() / denom,
            a2: (1.0 - beta) / denom,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    fn process(&mut self, section: &Section, x: f64) -> f64 {
        let y = section.b0 * x + section.b1 * self.x1 + section.b2 * self.x2
            - section.a1 * self.y1
            - section.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

pub(super) struct Equalizer<S> {
    input: S,
    sections: Vec<Section>,
    // One filter state per section per channel.
    states: Vec<[BiquadState; 2]>,
    position: u16,
}

impl<S> Equalizer<S>
where
    S: Source<Item = f32>,
{
    fn new(input: S, sections: Vec<Section>) -> Self {
        let states = vec![[BiquadState::default(); 2]; sections.len()];
        Self {
            input,
            sections,
            states,
            position: 0,
        }
    }
}

impl<S> Iterator for Equalizer<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.input.next()?;
        let channels = self.input.channels().max(1);
        let channel = usize::from(self.position % 2.min(channels));

        let mut value = f64::from(sample);
        for (section, state) in self.sections.iter().zip(self.states.iter_mut()) {
            value = state[channel].process(section, value);
        }

        self.position = (self.position + 1) % channels;
        Some(value as f32)
    }
}

impl<S> Source for Equalizer<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.input.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.input.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.input.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.input.total_duration()
    }
}

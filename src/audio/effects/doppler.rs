//! Doppler effect
//!
//! Simulates a sound source at a distance from the listener, optionally
//! moving. Distance delays the signal (`samples-per-meter = rate / 343`)
//! and attenuates it with the inverse square; a changing distance changes
//! the effective read rate, which is what produces the pitch bend.

use crate::audio::SAMPLE_RATE;
use rodio::Source;
use std::time::Duration;

/// Speed of sound in m/s at 20 deg C.
const SPEED_OF_SOUND: f64 = 343.0;

/// Distance below this is clamped; the inverse-square gain diverges at 0.
const MIN_DISTANCE: f64 = 0.1;

/// Frames between distance updates.
const UPDATE_INTERVAL: u64 = 512;

/// Interpolation quality for the fractional delay-line read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DopplerQuality {
    /// Nearest-sample read.
    Low = 1,
    /// Linear interpolation.
    High = 2,
}

impl DopplerQuality {
    /// Clamps an arbitrary quality number into the supported range.
    pub fn from_level(level: i32) -> Self {
        if level >= 2 {
            DopplerQuality::High
        } else {
            DopplerQuality::Low
        }
    }
}

/// Doppler source parameters.
#[derive(Debug, Clone, Copy)]
pub struct DopplerConfig {
    pub quality: DopplerQuality,
    /// Initial distance in meters.
    pub distance: f64,
    /// Velocity in m/s; positive moves away, negative moves toward.
    pub velocity: f64,
}

pub(super) struct Doppler<S> {
    input: S,
    quality: DopplerQuality,
    samples_per_meter: f64,
    distance: f64,
    velocity: f64,
    initial_delay: f64,

    // Frames pulled from the input so far; grows on demand.
    frames: Vec<[f32; 2]>,
    input_done: bool,
    pending_right: Option<f32>,
    frames_emitted: u64,
    current_delay: f64,
}

impl<S> Doppler<S>
where
    S: Source<Item = f32>,
{
    pub(super) fn new(input: S, config: &DopplerConfig) -> Self {
        let distance = config.distance.max(MIN_DISTANCE);
        let samples_per_meter = f64::from(SAMPLE_RATE) / SPEED_OF_SOUND;
        let initial_delay = distance * samples_per_meter;
        Self {
            input,
            quality: config.quality,
            samples_per_meter,
            distance,
            velocity: config.velocity,
            initial_delay,
            frames: Vec::new(),
            input_done: false,
            pending_right: None,
            frames_emitted: 0,
            current_delay: initial_delay,
        }
    }

    /// Ensures input frames are buffered up to and including `frame`.
    fn fill_to(&mut self, frame: usize) {
        while !self.input_done && self.frames.len() <= frame + 1 {
            match (self.input.next(), self.input.next()) {
                (Some(left), Some(right)) => self.frames.push([left, right]),
                (Some(left), None) => {
                    self.frames.push([left, left]);
                    self.input_done = true;
                }
                _ => self.input_done = true,
            }
        }
    }

    fn read_channel(&self, pos: f64, channel: usize) -> Option<f32> {
        if pos < 0.0 {
            return Some(0.0);
        }
        let base = pos.floor() as usize;
        match self.quality {
            DopplerQuality::Low => self.frames.get(base).map(|f| f[channel]),
            DopplerQuality::High => {
                let a = self.frames.get(base)?[channel];
                let b = self
                    .frames
                    .get(base + 1)
                    .map(|f| f[channel])
                    .unwrap_or(a);
                let frac = (pos - pos.floor()) as f32;
                Some(a + (b - a) * frac)
            }
        }
    }
}

impl<S> Iterator for Doppler<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if let Some(right) = self.pending_right.take() {
            return Some(right);
        }

        if self.frames_emitted % UPDATE_INTERVAL == 0 && self.frames_emitted > 0 {
            let dt = UPDATE_INTERVAL as f64 / f64::from(SAMPLE_RATE);
            self.distance = (self.distance + self.velocity * dt).max(MIN_DISTANCE);
            self.current_delay = self.distance * self.samples_per_meter;
        }

        // The read head lags real time by the delay growth since start.
        let pos = self.frames_emitted as f64 - (self.current_delay - self.initial_delay);

        self.fill_to(pos.max(0.0).floor() as usize);
        if self.input_done && pos.floor() as usize >= self.frames.len() {
            return None;
        }

        let gain = (1.0 / (self.distance * self.distance)) as f32;
        let left = self.read_channel(pos, 0)? * gain;
        let right = self.read_channel(pos, 1)? * gain;

        self.frames_emitted += 1;
        self.pending_right = Some(right);
        Some(left)
    }
}

impl<S> Source for Doppler<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

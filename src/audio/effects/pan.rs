//! Stereo pan effect
//!
//! Pan in [-1, +1]: at -1 only the left channel carries signal, at +1 only
//! the right. The off-side channel is attenuated linearly in between.

use rodio::Source;
use std::time::Duration;

/// Stereo pan position.
#[derive(Debug, Clone, Copy)]
pub struct PanConfig {
    pub pan: f64,
}

pub(super) struct Pan<S> {
    input: S,
    left_gain: f32,
    right_gain: f32,
    position: u16,
}

impl<S> Pan<S>
where
    S: Source<Item = f32>,
{
    pub(super) fn new(input: S, pan: f64) -> Self {
        let pan = pan.clamp(-1.0, 1.0) as f32;
        Self {
            input,
            left_gain: if pan > 0.0 { 1.0 - pan } else { 1.0 },
            right_gain: if pan < 0.0 { 1.0 + pan } else { 1.0 },
            position: 0,
        }
    }
}

impl<S> Iterator for Pan<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.input.next()?;
        let channels = self.input.channels();
        let gain = match (channels, self.position) {
            // Mono input has no sides to weight.
            (0 | 1, _) => 1.0,
            (_, 0) => self.left_gain,
            (_, 1) => self.right_gain,
            _ => 1.0,
        };
        self.position = (self.position + 1) % channels.max(1);
        Some(sample * gain)
    }
}

impl<S> Source for Pan<S>
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

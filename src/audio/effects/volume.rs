//! Volume effect
//!
//! Base-2 dB-equivalent gain: a linear fader value `v` in (0, 1) maps to
//! the exponent `log2(v)`, zero is a silent flag, and anything at or above
//! unity clamps to unity - there is no boost path.

use rodio::Source;
use std::time::Duration;

/// Linear fader value, 0.0 (silent) to 1.0 (unity).
#[derive(Debug, Clone, Copy)]
pub struct VolumeConfig {
    pub volume: f64,
}

pub(super) struct Volume<S> {
    input: S,
    gain: f32,
}

impl<S> Volume<S>
where
    S: Source<Item = f32>,
{
    pub(super) fn new(input: S, config: &VolumeConfig) -> Self {
        Self {
            input,
            gain: gain_for(config.volume),
        }
    }
}

fn gain_for(volume: f64) -> f32 {
    if volume == 0.0 {
        return 0.0;
    }
    let exponent = if volume > 0.0 && volume < 1.0 {
        volume.log2()
    } else {
        0.0
    };
    2f64.powf(exponent) as f32
}

impl<S> Iterator for Volume<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.input.next().map(|s| s * self.gain)
    }
}

impl<S> Source for Volume<S>
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_mapping() {
        assert_eq!(gain_for(0.0), 0.0);
        assert!((gain_for(0.5) - 0.5).abs() < 1e-6);
        assert!((gain_for(0.25) - 0.25).abs() < 1e-6);
        assert!((gain_for(1.0) - 1.0).abs() < 1e-6);
        // No boost above unity.
        assert!((gain_for(2.0) - 1.0).abs() < 1e-6);
    }
}

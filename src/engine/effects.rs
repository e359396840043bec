//! Per-device effect configuration
//!
//! Each tunable sits behind its own lock; the dispatch path takes read
//! locks just long enough to snapshot an [`EffectsConfig`] for one
//! playback. Pan carries a mode because keyboards can pan by key position
//! while mice always pan randomly.

use crate::audio::effects::{
    DopplerConfig, DopplerQuality, EffectsConfig, EqualizerConfig, PanConfig, PitchConfig,
    VolumeConfig,
};
use parking_lot::RwLock;

/// How the pan value for a playback is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanMode {
    /// Pan derived from the key's horizontal position on the layout.
    #[default]
    KeyPosition,
    /// Uniform random pan per playback.
    Random,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PitchShiftState {
    pub enabled: bool,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PanState {
    pub enabled: bool,
    pub mode: PanMode,
    /// Number of contiguous horizontal keys panned across (key-position mode).
    pub max_x: u32,
}

impl Default for PanState {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: PanMode::KeyPosition,
            max_x: 18,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EqualizerState {
    pub enabled: bool,
    pub config: EqualizerConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct DopplerState {
    pub enabled: bool,
    pub config: DopplerConfig,
}

impl Default for DopplerState {
    fn default() -> Self {
        Self {
            enabled: false,
            config: DopplerConfig {
                quality: DopplerQuality::High,
                distance: 1.0,
                velocity: 0.0,
            },
        }
    }
}

/// All effect tunables for one device.
#[derive(Default)]
pub struct DeviceEffects {
    pitch: RwLock<PitchShiftState>,
    pan: RwLock<PanState>,
    equalizer: RwLock<EqualizerState>,
    doppler: RwLock<DopplerState>,
}

impl DeviceEffects {
    /// Zero on either bound disables the shift regardless of the flag.
    pub fn set_pitch_shift(&self, enabled: bool, lower: f64, upper: f64) {
        *self.pitch.write() = PitchShiftState {
            enabled: enabled && lower != 0.0 && upper != 0.0,
            lower,
            upper,
        };
    }

    pub fn pitch_shift(&self) -> PitchShiftState {
        *self.pitch.read()
    }

    pub fn set_pan(&self, enabled: bool, mode: PanMode, max_x: u32) {
        *self.pan.write() = PanState {
            enabled,
            mode,
            max_x: max_x.max(1),
        };
    }

    pub fn pan(&self) -> PanState {
        *self.pan.read()
    }

    pub fn set_equalizer(&self, enabled: bool, config: EqualizerConfig) {
        *self.equalizer.write() = EqualizerState { enabled, config };
    }

    pub fn equalizer(&self) -> EqualizerState {
        *self.equalizer.read()
    }

    pub fn set_doppler(&self, enabled: bool, config: DopplerConfig) {
        *self.doppler.write() = DopplerState { enabled, config };
    }

    pub fn doppler(&self) -> DopplerState {
        *self.doppler.read()
    }

    /// Assembles the per-playback snapshot. The pan value is computed by
    /// the caller (it depends on the event); each lock is held only for
    /// the copy.
    pub fn snapshot(&self, pan: Option<PanConfig>, volume: f64) -> EffectsConfig {
        let pitch = {
            let state = self.pitch.read();
            state.enabled.then(|| PitchConfig {
                semitones: [state.lower, state.upper],
            })
        };
        let equalizer = {
            let state = self.equalizer.read();
            state.enabled.then_some(state.config)
        };
        let doppler = {
            let state = self.doppler.read();
            state.enabled.then_some(state.config)
        };

        EffectsConfig {
            pitch,
            pan,
            equalizer,
            doppler,
            volume: Some(VolumeConfig { volume }),
        }
    }
}

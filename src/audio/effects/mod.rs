//! Per-playback effect chain
//!
//! A fixed pipeline applied in order: pitch-shift, pan, equalizer, doppler,
//! volume. Each stage wraps the previous streamer; an absent sub-config is
//! the identity. The configuration is a snapshot taken before playback, so
//! later mutation never affects in-flight audio.

mod doppler;
mod equalizer;
mod pan;
mod pitch;
mod volume;

pub use doppler::{DopplerConfig, DopplerQuality};
pub use equalizer::EqualizerConfig;
pub use pan::PanConfig;
pub use pitch::PitchConfig;
pub use volume::VolumeConfig;

use super::BufferSource;
use rand::Rng;
use rodio::Source;

/// Boxed streamer flowing through the chain.
pub type BoxedSource = Box<dyn Source<Item = f32> + Send>;

/// Snapshot of every effect for one playback. `None` fields are skipped.
#[derive(Debug, Clone, Default)]
pub struct EffectsConfig {
    pub pitch: Option<PitchConfig>,
    pub pan: Option<PanConfig>,
    pub equalizer: Option<EqualizerConfig>,
    pub doppler: Option<DopplerConfig>,
    pub volume: Option<VolumeConfig>,
}

/// Builds the effect chain on top of a fresh streamer view.
pub fn apply<R: Rng>(config: &EffectsConfig, source: BufferSource, rng: &mut R) -> BoxedSource {
    let mut out: BoxedSource = Box::new(source);

    if let Some(cfg) = &config.pitch {
        out = pitch::apply(out, cfg, rng);
    }
    if let Some(cfg) = &config.pan {
        out = Box::new(pan::Pan::new(out, cfg.pan));
    }
    if let Some(cfg) = &config.equalizer {
        out = equalizer::apply(out, cfg);
    }
    if let Some(cfg) = &config.doppler {
        out = Box::new(doppler::Doppler::new(out, cfg));
    }
    if let Some(cfg) = &config.volume {
        out = Box::new(volume::Volume::new(out, cfg));
    }

    out
}

//! Profile-driven sound resolution
//!
//! Maps an input event to a decoded audio buffer through the active
//! profile: a key- or button-specific mapping wins, then the profile's
//! default pool, then any source at all. The action then selects the press
//! or release file; a missing action-specific file means silence, which is
//! a legitimate "no sound on release" design.

use crate::audio::library::AudioLibrary;
use crate::audio::AudioBuffer;
use crate::error::{Error, ProfileError};
use crate::input::{Action, ButtonEvent, KeyEvent};
use crate::profile::{Profile, SourceConfig};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// A profile with its source table and fully decoded audio cache. Built
/// once per profile switch and swapped atomically; in-flight playbacks keep
/// the old bundle's buffers alive through their `Arc`s.
pub struct ProfileBundle {
    pub profile: Arc<Profile>,
    pub sources: HashMap<String, SourceConfig>,
    pub audio: HashMap<String, Arc<AudioBuffer>>,
}

impl ProfileBundle {
    /// Decodes every audio file the profile references. Any failure aborts
    /// the whole preparation so a half-decoded bundle can never be applied.
    pub fn prepare(profile: Arc<Profile>, library: &AudioLibrary) -> Result<Self, Error> {
        let mut sources = HashMap::with_capacity(profile.sources.len());
        let mut files: Vec<String> = Vec::new();

        for source in &profile.sources {
            let config = source.config();
            for path in [&config.press, &config.release].into_iter().flatten() {
                if !files.contains(path) {
                    files.push(path.clone());
                }
            }
            sources.insert(source.id.clone(), config);
        }

        let mut audio = HashMap::with_capacity(files.len());
        for file in files {
            let buffer = library.load(&profile.location.join(&file))?;
            audio.insert(file, buffer);
        }

        Ok(Self {
            profile,
            sources,
            audio,
        })
    }
}

/// Resolves the buffer for a keyboard event, or `None` for silence.
pub fn resolve_key_sound<R: Rng>(
    bundle: &ProfileBundle,
    event: &KeyEvent,
    rng: &mut R,
) -> Result<Option<Arc<AudioBuffer>>, ProfileError> {
    let profile = &bundle.profile;
    if profile.sources.is_empty() {
        return Err(ProfileError::NoSources(profile.details.name.clone()));
    }

    // A key matches a trigger by name (case-insensitive) or by its code as
    // a decimal string.
    let code = event.key.code.to_string();
    let mut source_id: Option<String> = None;
    for mapping in &profile.keys.other {
        let matched = mapping.keys.iter().any(|trigger| {
            trigger.eq_ignore_ascii_case(event.key.name) || trigger == &code
        });
        if matched {
            source_id = mapping.sound.pick(rng).map(str::to_string);
            break;
        }
    }

    let source_id = match source_id {
        Some(id) => id,
        None if !profile.keys.default.is_empty() => {
            profile.keys.default[rng.gen_range(0..profile.keys.default.len())].clone()
        }
        None => profile.sources[rng.gen_range(0..profile.sources.len())].id.clone(),
    };

    buffer_for_action(bundle, &source_id, event.action)
}

/// Resolves the buffer for a mouse button event, or `None` for silence.
pub fn resolve_button_sound<R: Rng>(
    bundle: &ProfileBundle,
    event: &ButtonEvent,
    rng: &mut R,
) -> Result<Option<Arc<AudioBuffer>>, ProfileError> {
    let profile = &bundle.profile;
    if profile.sources.is_empty() {
        return Err(ProfileError::NoSources(profile.details.name.clone()));
    }

    let mut source_id: Option<String> = None;
    for mapping in &profile.buttons.other {
        let matched = mapping
            .buttons
            .iter()
            .any(|trigger| trigger.eq_ignore_ascii_case(event.button.name()));
        if matched {
            source_id = mapping.sound.pick(rng).map(str::to_string);
            break;
        }
    }

    let source_id = match source_id {
        Some(id) => id,
        None => match &profile.buttons.default {
            Some(id) if !id.is_empty() => id.clone(),
            _ => profile.sources[rng.gen_range(0..profile.sources.len())].id.clone(),
        },
    };

    buffer_for_action(bundle, &source_id, event.action)
}

fn buffer_for_action(
    bundle: &ProfileBundle,
    source_id: &str,
    action: Action,
) -> Result<Option<Arc<AudioBuffer>>, ProfileError> {
    let config = bundle.sources.get(source_id).ok_or_else(|| {
        ProfileError::SourceMissing {
            profile: bundle.profile.details.name.clone(),
            source_id: source_id.to_string(),
        }
    })?;

    let path = match action {
        Action::Press => &config.press,
        Action::Release => &config.release,
    };

    let Some(path) = path else {
        return Ok(None);
    };

    bundle
        .audio
        .get(path)
        .cloned()
        .map(Some)
        .ok_or_else(|| ProfileError::SourceMissing {
            profile: bundle.profile.details.name.clone(),
            source_id: path.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Button;
    use crate::key;
    use crate::profile::{
        ButtonMapping, Buttons, DeviceType, KeyMapping, Keys, ProfileDetails, SoundRef, Source,
        SourceSpec,
    };
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::time::Instant;

    fn buffer() -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new(vec![0.0; 4]))
    }

    fn test_bundle() -> ProfileBundle {
        let profile = Arc::new(Profile {
            details: ProfileDetails {
                name: "test".to_string(),
                author: String::new(),
                description: String::new(),
                device_type: DeviceType::Keyboard,
            },
            sources: vec![
                Source {
                    id: "s1".to_string(),
                    source: SourceSpec::Split {
                        press: Some("p1.wav".to_string()),
                        release: Some("r1.wav".to_string()),
                    },
                },
                Source {
                    id: "s2".to_string(),
                    source: SourceSpec::Path("p2.wav".to_string()),
                },
            ],
            keys: Keys {
                default: vec!["s1".to_string(), "s2".to_string()],
                other: vec![KeyMapping {
                    keys: vec!["Enter".to_string()],
                    sound: SoundRef::One("s2".to_string()),
                }],
            },
            buttons: Buttons {
                default: Some("s1".to_string()),
                other: vec![ButtonMapping {
                    buttons: vec!["middle".to_string()],
                    sound: SoundRef::One("s2".to_string()),
                }],
            },
            location: Default::default(),
        });

        let sources = profile
            .sources
            .iter()
            .map(|s| (s.id.clone(), s.config()))
            .collect();
        let audio = [
            ("p1.wav".to_string(), buffer()),
            ("r1.wav".to_string(), buffer()),
            ("p2.wav".to_string(), buffer()),
        ]
        .into_iter()
        .collect();

        ProfileBundle {
            profile,
            sources,
            audio,
        }
    }

    fn key_event(k: crate::key::Key, action: Action) -> KeyEvent {
        KeyEvent {
            device: Arc::from("test"),
            key: k,
            action,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_other_mapping_wins() {
        let bundle = test_bundle();
        let mut rng = SmallRng::seed_from_u64(1);
        // Enter maps to s2, which has a press sound and no release sound.
        let press = resolve_key_sound(&bundle, &key_event(key::ENTER, Action::Press), &mut rng)
            .unwrap();
        assert!(press.is_some());
        let release =
            resolve_key_sound(&bundle, &key_event(key::ENTER, Action::Release), &mut rng).unwrap();
        assert!(release.is_none());
    }

    #[test]
    fn test_trigger_matches_decimal_code() {
        let mut bundle = test_bundle();
        let profile = Arc::get_mut(&mut bundle.profile).unwrap();
        profile.keys.other[0].keys = vec![key::ENTER.code.to_string()];

        let mut rng = SmallRng::seed_from_u64(1);
        let press = resolve_key_sound(&bundle, &key_event(key::ENTER, Action::Press), &mut rng)
            .unwrap();
        assert!(press.is_some());
    }

    #[test]
    fn test_default_pool_distribution() {
        let bundle = test_bundle();
        let mut rng = SmallRng::seed_from_u64(42);

        // A is not in `other`, so it samples from the two defaults. s1 has a
        // release sound, s2 does not: count release outcomes over 1000 draws.
        let mut with_sound = 0u32;
        for _ in 0..1000 {
            let resolved =
                resolve_key_sound(&bundle, &key_event(key::A, Action::Release), &mut rng).unwrap();
            if resolved.is_some() {
                with_sound += 1;
            }
        }
        // Uniform over {s1, s2}: expect 50% within 5 points.
        assert!(
            (450..=550).contains(&with_sound),
            "distribution skewed: {with_sound}/1000"
        );
    }

    #[test]
    fn test_falls_back_to_all_sources() {
        let mut bundle = test_bundle();
        {
            let profile = Arc::get_mut(&mut bundle.profile).unwrap();
            profile.keys.default.clear();
            profile.keys.other.clear();
        }
        let mut rng = SmallRng::seed_from_u64(9);
        let resolved =
            resolve_key_sound(&bundle, &key_event(key::A, Action::Press), &mut rng).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn test_unknown_source_id_is_error() {
        let mut bundle = test_bundle();
        {
            let profile = Arc::get_mut(&mut bundle.profile).unwrap();
            profile.keys.other[0].sound = SoundRef::One("ghost".to_string());
        }
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(matches!(
            resolve_key_sound(&bundle, &key_event(key::ENTER, Action::Press), &mut rng),
            Err(ProfileError::SourceMissing { .. })
        ));
    }

    #[test]
    fn test_button_resolution() {
        let bundle = test_bundle();
        let mut rng = SmallRng::seed_from_u64(5);

        let middle = ButtonEvent {
            device: Arc::from("test"),
            button: Button::Middle,
            action: Action::Press,
            timestamp: Instant::now(),
        };
        assert!(resolve_button_sound(&bundle, &middle, &mut rng)
            .unwrap()
            .is_some());

        // Left is not in `other`, falls back to the default source s1.
        let left = ButtonEvent {
            device: Arc::from("test"),
            button: Button::Left,
            action: Action::Release,
            timestamp: Instant::now(),
        };
        // s1 has a release sound.
        assert!(resolve_button_sound(&bundle, &left, &mut rng)
            .unwrap()
            .is_some());
    }
}

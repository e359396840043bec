//! Profile model
//!
//! A profile is a named bundle of audio files plus the mapping from keys or
//! buttons to sound sources, loaded from a `profile.yaml` in its own
//! directory. Audio paths inside a profile are relative to that directory.

pub mod store;

use crate::error::ProfileError;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Which input device a profile is for. A profile is only ever used for its
/// matching device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Keyboard,
    Mouse,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Keyboard => "keyboard",
            DeviceType::Mouse => "mouse",
        }
    }
}

// Anything that is not "mouse" is a keyboard profile, including missing or
// unrecognized values.
impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.eq_ignore_ascii_case("mouse") {
            Ok(DeviceType::Mouse)
        } else {
            Ok(DeviceType::Keyboard)
        }
    }
}

/// The `profile:` header of a profile file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileDetails {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "device")]
    pub device_type: DeviceType,
}

/// The audio file(s) behind a source id: either a single path (press only)
/// or separate press/release paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Path(String),
    Split {
        #[serde(default)]
        press: Option<String>,
        #[serde(default)]
        release: Option<String>,
    },
}

/// A named (press, release) audio pair within a profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub id: String,
    pub source: SourceSpec,
}

/// Resolved press/release paths for a source.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    pub press: Option<String>,
    pub release: Option<String>,
}

impl Source {
    pub fn config(&self) -> SourceConfig {
        match &self.source {
            SourceSpec::Path(path) => SourceConfig {
                press: Some(path.clone()),
                release: None,
            },
            SourceSpec::Split { press, release } => SourceConfig {
                press: press.clone(),
                release: release.clone(),
            },
        }
    }
}

/// One or several source ids; lists are sampled uniformly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SoundRef {
    One(String),
    Many(Vec<String>),
}

impl SoundRef {
    /// Picks a source id, sampling uniformly from lists.
    pub fn pick<'a, R: Rng>(&'a self, rng: &mut R) -> Option<&'a str> {
        match self {
            SoundRef::One(id) => Some(id.as_str()),
            SoundRef::Many(ids) if !ids.is_empty() => {
                Some(ids[rng.gen_range(0..ids.len())].as_str())
            }
            SoundRef::Many(_) => None,
        }
    }
}

/// A key-specific mapping in the `other` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyMapping {
    #[serde(default)]
    pub keys: Vec<String>,
    pub sound: SoundRef,
}

/// Key-to-source mappings of a keyboard profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Keys {
    #[serde(default)]
    pub default: Vec<String>,
    #[serde(default)]
    pub other: Vec<KeyMapping>,
}

/// A button-specific mapping in the `other` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonMapping {
    #[serde(default)]
    pub buttons: Vec<String>,
    pub sound: SoundRef,
}

/// Button-to-source mappings of a mouse profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Buttons {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub other: Vec<ButtonMapping>,
}

/// A loaded profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(rename = "profile")]
    pub details: ProfileDetails,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub keys: Keys,
    #[serde(default)]
    pub buttons: Buttons,
    /// Directory the profile was loaded from. Not serialized.
    #[serde(skip)]
    pub location: PathBuf,
}

impl Profile {
    /// Checks that every referenced audio file sits next to `profile.yaml`.
    pub fn validate(&self) -> Result<(), ProfileError> {
        for source in &self.sources {
            let config = source.config();
            for path in [&config.press, &config.release].into_iter().flatten() {
                if !self.location.join(path).is_file() {
                    return Err(ProfileError::SourceMissing {
                        profile: self.details.name.clone(),
                        source_id: format!("{}: {}", source.id, path),
                    });
                }
            }
        }
        Ok(())
    }
}

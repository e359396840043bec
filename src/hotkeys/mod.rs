//! Hotkey configuration and matching
//!
//! Hotkeys are grouped by the exact set of modifier keys that must be held;
//! each group carries bindings from a released key to a device-targeted
//! action. Groups are loaded from `hotkeys.yaml` (a default set is written
//! on first use). Action handlers live in a registry owned by the engine
//! and injected at construction; there are no process-wide tables.

pub mod matcher;

pub use matcher::{ActionRegistry, Handler, HotkeyFired, HotkeyMatcher};

use crate::error::HotkeyError;
use crate::key;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const HOTKEYS_FILE: &str = "hotkeys.yaml";

/// Which device an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyTarget {
    All,
    Keyboard,
    Mouse,
    None,
}

impl HotkeyTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyTarget::All => "all",
            HotkeyTarget::Keyboard => "keyboard",
            HotkeyTarget::Mouse => "mouse",
            HotkeyTarget::None => "none",
        }
    }
}

/// What a binding does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotkeyAction {
    Mute,
    Unmute,
    ToggleMute,
    IncreaseVolume,
    DecreaseVolume,
    ToggleOskHelpers,
}

impl HotkeyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyAction::Mute => "mute",
            HotkeyAction::Unmute => "unmute",
            HotkeyAction::ToggleMute => "toggle-mute",
            HotkeyAction::IncreaseVolume => "increase-volume",
            HotkeyAction::DecreaseVolume => "decrease-volume",
            HotkeyAction::ToggleOskHelpers => "toggle-osk-helpers",
        }
    }
}

/// A device-targeted action with an optional parameter (e.g. volume step).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceAction {
    pub action: HotkeyAction,
    #[serde(rename = "target")]
    pub device: HotkeyTarget,
    #[serde(default)]
    pub value: String,
}

impl DeviceAction {
    /// Parses the binding's value as a float parameter.
    pub fn value_as_f64(&self) -> Result<f64, HotkeyError> {
        self.value
            .parse()
            .map_err(|_| HotkeyError::InvalidValue(self.value.clone()))
    }
}

/// One key binding within a group.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyBinding {
    pub key: String,
    pub action: DeviceAction,
}

/// A set of modifier keys plus the bindings that fire while exactly those
/// modifiers are held.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyGroup {
    pub modifiers: Vec<String>,
    pub keys: Vec<HotkeyBinding>,
}

/// The default hotkeys written when no `hotkeys.yaml` exists.
pub fn default_hotkeys() -> Vec<HotkeyGroup> {
    vec![HotkeyGroup {
        modifiers: vec![
            key::LEFT_CONTROL.name.to_string(),
            key::LEFT_SHIFT.name.to_string(),
            key::LEFT_ALT.name.to_string(),
        ],
        keys: vec![
            HotkeyBinding {
                key: key::M.name.to_string(),
                action: DeviceAction {
                    action: HotkeyAction::Mute,
                    device: HotkeyTarget::All,
                    value: String::new(),
                },
            },
            HotkeyBinding {
                key: key::U.name.to_string(),
                action: DeviceAction {
                    action: HotkeyAction::Unmute,
                    device: HotkeyTarget::All,
                    value: String::new(),
                },
            },
            HotkeyBinding {
                key: key::UP.name.to_string(),
                action: DeviceAction {
                    action: HotkeyAction::IncreaseVolume,
                    device: HotkeyTarget::All,
                    value: "0.1".to_string(),
                },
            },
            HotkeyBinding {
                key: key::DOWN.name.to_string(),
                action: DeviceAction {
                    action: HotkeyAction::DecreaseVolume,
                    device: HotkeyTarget::All,
                    value: "0.1".to_string(),
                },
            },
        ],
    }]
}

/// Loads groups from `<dir>/hotkeys.yaml`, writing the defaults first if
/// the file does not exist.
pub fn load_groups(dir: &Path) -> Result<Vec<HotkeyGroup>, HotkeyError> {
    let path = dir.join(HOTKEYS_FILE);

    if !path.exists() {
        let groups = default_hotkeys();
        let yaml =
            serde_yaml::to_string(&groups).map_err(|e| HotkeyError::Parse(e.to_string()))?;
        std::fs::write(&path, yaml)?;
        return Ok(groups);
    }

    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| HotkeyError::Parse(e.to_string()))
}

/// Persists groups to `<dir>/hotkeys.yaml`.
pub fn save_groups(dir: &Path, groups: &[HotkeyGroup]) -> Result<(), HotkeyError> {
    let yaml = serde_yaml::to_string(groups).map_err(|e| HotkeyError::Parse(e.to_string()))?;
    std::fs::write(dir.join(HOTKEYS_FILE), yaml)?;
    Ok(())
}

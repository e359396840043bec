//! Built-in hotkey action handlers
//!
//! Wires the mute/unmute/volume actions for each target device to the
//! shared volume state, and the overlay toggle to the OSK flag. The
//! registry is built once at engine construction and injected into the
//! matcher.

use super::volume::VolumeControl;
use super::OskState;
use crate::hotkeys::{ActionRegistry, HotkeyAction, HotkeyTarget};
use std::sync::Arc;

pub(super) fn builtin_registry(
    volumes: Arc<VolumeControl>,
    osk: Arc<OskState>,
) -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    // Mute
    let v = volumes.clone();
    registry.register(HotkeyTarget::All, HotkeyAction::Mute, move |_| {
        v.mute_keyboard();
        v.mute_mouse();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Keyboard, HotkeyAction::Mute, move |_| {
        v.mute_keyboard();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Mouse, HotkeyAction::Mute, move |_| {
        v.mute_mouse();
        Ok(())
    });

    // Unmute
    let v = volumes.clone();
    registry.register(HotkeyTarget::All, HotkeyAction::Unmute, move |_| {
        v.unmute_keyboard();
        v.unmute_mouse();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Keyboard, HotkeyAction::Unmute, move |_| {
        v.unmute_keyboard();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Mouse, HotkeyAction::Unmute, move |_| {
        v.unmute_mouse();
        Ok(())
    });

    // Toggle mute
    let v = volumes.clone();
    registry.register(HotkeyTarget::All, HotkeyAction::ToggleMute, move |_| {
        v.toggle_mute_keyboard();
        v.toggle_mute_mouse();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Keyboard, HotkeyAction::ToggleMute, move |_| {
        v.toggle_mute_keyboard();
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::Mouse, HotkeyAction::ToggleMute, move |_| {
        v.toggle_mute_mouse();
        Ok(())
    });

    // Volume steps; the step size comes from the matched binding's value.
    let v = volumes.clone();
    registry.register(HotkeyTarget::All, HotkeyAction::IncreaseVolume, move |a| {
        let step = a.value_as_f64()?;
        v.adjust_keyboard(step);
        v.adjust_mouse(step);
        Ok(())
    });
    let v = volumes.clone();
    registry.register(
        HotkeyTarget::Keyboard,
        HotkeyAction::IncreaseVolume,
        move |a| {
            v.adjust_keyboard(a.value_as_f64()?);
            Ok(())
        },
    );
    let v = volumes.clone();
    registry.register(HotkeyTarget::Mouse, HotkeyAction::IncreaseVolume, move |a| {
        v.adjust_mouse(a.value_as_f64()?);
        Ok(())
    });
    let v = volumes.clone();
    registry.register(HotkeyTarget::All, HotkeyAction::DecreaseVolume, move |a| {
        let step = a.value_as_f64()?;
        v.adjust_keyboard(-step);
        v.adjust_mouse(-step);
        Ok(())
    });
    let v = volumes.clone();
    registry.register(
        HotkeyTarget::Keyboard,
        HotkeyAction::DecreaseVolume,
        move |a| {
            v.adjust_keyboard(-a.value_as_f64()?);
            Ok(())
        },
    );
    let v = volumes;
    registry.register(HotkeyTarget::Mouse, HotkeyAction::DecreaseVolume, move |a| {
        v.adjust_mouse(-a.value_as_f64()?);
        Ok(())
    });

    registry.register(
        HotkeyTarget::None,
        HotkeyAction::ToggleOskHelpers,
        move |_| {
            let mut enabled = osk.enabled.write();
            *enabled = !*enabled;
            Ok(())
        },
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::{DeviceAction, HotkeyBinding, HotkeyGroup, HotkeyMatcher};
    use crate::input::{Action, KeyEvent};
    use crate::key;
    use std::sync::Arc;
    use std::time::Instant;

    fn matcher_with(groups: Vec<HotkeyGroup>) -> (HotkeyMatcher, Arc<VolumeControl>, Arc<OskState>) {
        let volumes = Arc::new(VolumeControl::new());
        let osk = Arc::new(OskState::default());
        let registry = builtin_registry(volumes.clone(), osk.clone());
        (HotkeyMatcher::new(groups, registry, Vec::new()), volumes, osk)
    }

    fn binding(key_name: &str, action: HotkeyAction, device: HotkeyTarget, value: &str) -> HotkeyGroup {
        HotkeyGroup {
            modifiers: vec![],
            keys: vec![HotkeyBinding {
                key: key_name.to_string(),
                action: DeviceAction {
                    action,
                    device,
                    value: value.to_string(),
                },
            }],
        }
    }

    fn release(k: crate::key::Key) -> KeyEvent {
        KeyEvent {
            device: Arc::from("test"),
            key: k,
            action: Action::Release,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_mute_all_hits_both_devices() {
        let (matcher, volumes, _) = matcher_with(vec![binding(
            "M",
            HotkeyAction::Mute,
            HotkeyTarget::All,
            "",
        )]);
        matcher.execute(&release(key::M), &[]).unwrap();
        assert_eq!(volumes.keyboard_volume(), 0.0);
        assert_eq!(volumes.mouse_volume(), 0.0);
    }

    #[test]
    fn test_volume_step_uses_binding_value() {
        let (matcher, volumes, _) = matcher_with(vec![binding(
            "Down",
            HotkeyAction::DecreaseVolume,
            HotkeyTarget::Keyboard,
            "0.3",
        )]);
        matcher.execute(&release(key::DOWN), &[]).unwrap();
        assert!((volumes.keyboard_volume() - 0.7).abs() < 1e-9);
        // Mouse untouched for a keyboard-targeted action.
        assert_eq!(volumes.mouse_volume(), 1.0);
    }

    #[test]
    fn test_osk_toggle_flips_flag() {
        let (matcher, _, osk) = matcher_with(vec![binding(
            "O",
            HotkeyAction::ToggleOskHelpers,
            HotkeyTarget::None,
            "",
        )]);
        assert!(!*osk.enabled.read());
        matcher.execute(&release(key::O), &[]).unwrap();
        assert!(*osk.enabled.read());
        matcher.execute(&release(key::O), &[]).unwrap();
        assert!(!*osk.enabled.read());
    }
}

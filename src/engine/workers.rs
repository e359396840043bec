//! Event dispatch workers
//!
//! One worker task per event stream (keyboard, mouse, focus), each looping
//! on its channel until the cancellation token fires or the stream closes.
//! Dispatch itself takes read locks only to snapshot; resolution and
//! playback run on the blocking pool so a slow decode can never stall the
//! dispatcher, and hotkey matching runs on its own task so it never delays
//! audio.

use super::EngineShared;
use crate::audio::effects::{EffectsConfig, PanConfig};
use crate::engine::effects::PanMode;
use crate::error::Error;
use crate::focus::FocusEvent;
use crate::input::{Action, ButtonEvent, KeyEvent};
use crate::key;
use crate::profile::DeviceType;
use crate::resolve::{self, ProfileBundle};
use crate::rules::Profiles;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub(super) async fn keyboard_worker(
    shared: Arc<EngineShared>,
    mut events: mpsc::Receiver<KeyEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => shared.handle_key_event(event),
                None => break,
            },
        }
    }
    tracing::info!("keyboard event worker stopped");
}

pub(super) async fn mouse_worker(
    shared: Arc<EngineShared>,
    mut events: mpsc::Receiver<ButtonEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => shared.handle_button_event(event),
                None => break,
            },
        }
    }
    tracing::info!("mouse event worker stopped");
}

pub(super) async fn focus_worker(
    shared: Arc<EngineShared>,
    mut events: mpsc::Receiver<FocusEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    // Profile validation decodes audio; keep it off the
                    // async workers.
                    let shared = shared.clone();
                    tokio::task::spawn_blocking(move || shared.handle_focus_event(event));
                }
                None => break,
            },
        }
    }
    tracing::info!("focus event worker stopped");
}

impl EngineShared {
    pub(crate) fn handle_key_event(self: &Arc<Self>, event: KeyEvent) {
        tracing::debug!(key = event.key.name, action = ?event.action, "keyboard event");

        // Autorepeat arrives as another press while the key is held.
        if event.action == Action::Press && self.keys_down.read().contains(&event.key) {
            return;
        }

        let overlay_update = {
            let mut keys = self.keys_down.write();
            match event.action {
                Action::Press => {
                    if !keys.contains(&event.key) {
                        keys.push(event.key);
                    }
                }
                Action::Release => keys.retain(|k| *k != event.key),
            }
            self.overlay_update(&keys, event.action)
        };
        match overlay_update {
            Some(Some(text)) => {
                let config = self.osk.config.read().clone();
                self.overlay.set_text(&config, &text);
            }
            Some(None) => self.overlay.clear_text(),
            None => {}
        }

        // Hotkey dispatch gets a copy of the held keys and must never
        // delay audio.
        if event.action == Action::Release {
            let keys_down = self.keys_down.read().clone();
            let shared = self.clone();
            let hotkey_event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = shared.hotkeys.execute(&hotkey_event, &keys_down) {
                    tracing::error!(error = %e, "failed to execute hotkey");
                }
            });
        }

        let Some(bundle) = self.keyboard_bundle.read().clone() else {
            return;
        };
        if self.current_profiles.read().keyboard.is_none() {
            return;
        }

        let shared = self.clone();
        tokio::task::spawn_blocking(move || shared.play_key_sound(&bundle, &event));
    }

    pub(crate) fn handle_button_event(self: &Arc<Self>, event: ButtonEvent) {
        tracing::debug!(button = event.button.name(), action = ?event.action, "mouse event");

        let Some(bundle) = self.mouse_bundle.read().clone() else {
            return;
        };
        if self.current_profiles.read().mouse.is_none() {
            return;
        }

        let shared = self.clone();
        tokio::task::spawn_blocking(move || shared.play_button_sound(&bundle, &event));
    }

    pub(crate) fn handle_focus_event(&self, event: FocusEvent) {
        tracing::info!(executable = %event.executable, "focus changed");
        let new_profiles = self.rules.profiles_for_path(&event.executable);
        self.update_profiles(new_profiles);
    }

    /// Applies a new profile pair in two phases: validate and decode every
    /// changed slot first, then commit all of them. Any invalid slot drops
    /// the whole change; the profiles already in use stay untouched.
    pub(crate) fn update_profiles(&self, new: Profiles) {
        let diff = self.current_profiles.read().diff(&new);
        if !diff.any() {
            return;
        }

        let keyboard = if diff.keyboard {
            match self.prepare_slot(new.keyboard.as_deref(), DeviceType::Keyboard) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    tracing::warn!(error = %e, "application rule ignored: keyboard profile invalid");
                    return;
                }
            }
        } else {
            None
        };
        let mouse = if diff.mouse {
            match self.prepare_slot(new.mouse.as_deref(), DeviceType::Mouse) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    tracing::warn!(error = %e, "application rule ignored: mouse profile invalid");
                    return;
                }
            }
        } else {
            None
        };

        if let Some(bundle) = keyboard {
            *self.keyboard_bundle.write() = bundle;
        }
        if let Some(bundle) = mouse {
            *self.mouse_bundle.write() = bundle;
        }
        *self.current_profiles.write() = new;
    }

    /// Resolves a profile name to a fully decoded bundle for one device
    /// slot. `None` clears the slot.
    pub(crate) fn prepare_slot(
        &self,
        name: Option<&str>,
        device: DeviceType,
    ) -> Result<Option<Arc<ProfileBundle>>, Error> {
        let Some(name) = name else {
            return Ok(None);
        };
        let profile = self
            .profiles
            .find(name)
            .ok_or_else(|| crate::error::ProfileError::NotFound(name.to_string()))?;
        if profile.details.device_type != device {
            return Err(crate::error::ProfileError::DeviceMismatch {
                name: name.to_string(),
                expected: device.as_str(),
                actual: profile.details.device_type.as_str(),
            }
            .into());
        }
        let bundle = ProfileBundle::prepare(profile, &self.library)?;
        Ok(Some(Arc::new(bundle)))
    }

    fn play_key_sound(&self, bundle: &ProfileBundle, event: &KeyEvent) {
        let mut rng = rand::thread_rng();
        match resolve::resolve_key_sound(bundle, event, &mut rng) {
            Ok(Some(buffer)) => {
                let effects = self.keyboard_effects_snapshot(event, &mut rng);
                if let Err(e) = self.player.play(buffer, effects) {
                    tracing::error!(error = %e, "failed to play audio");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "failed to get audio for key event"),
        }
    }

    fn play_button_sound(&self, bundle: &ProfileBundle, event: &ButtonEvent) {
        let mut rng = rand::thread_rng();
        match resolve::resolve_button_sound(bundle, event, &mut rng) {
            Ok(Some(buffer)) => {
                let effects = self.mouse_effects_snapshot(&mut rng);
                if let Err(e) = self.player.play(buffer, effects) {
                    tracing::error!(error = %e, "failed to play audio");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "failed to get audio for button event"),
        }
    }

    /// Effect snapshot for one keyboard playback; each tunable's lock is
    /// held only for the copy.
    pub(crate) fn keyboard_effects_snapshot<R: Rng>(
        &self,
        event: &KeyEvent,
        rng: &mut R,
    ) -> EffectsConfig {
        let pan_state = self.keyboard_effects.pan();
        let pan = if pan_state.enabled {
            let value = match pan_state.mode {
                PanMode::Random => rng.gen_range(-1.0..1.0),
                PanMode::KeyPosition => event
                    .key
                    .position()
                    .map(|p| key::pan_value_for_position(p, pan_state.max_x))
                    .unwrap_or(0.0),
            };
            (value != 0.0).then_some(PanConfig { pan: value })
        } else {
            None
        };
        self.keyboard_effects
            .snapshot(pan, self.volumes.keyboard_volume())
    }

    /// Effect snapshot for one mouse playback; pan is always random when
    /// enabled.
    pub(crate) fn mouse_effects_snapshot<R: Rng>(&self, rng: &mut R) -> EffectsConfig {
        let pan_state = self.mouse_effects.pan();
        let pan = pan_state.enabled.then(|| PanConfig {
            pan: rng.gen_range(-1.0..1.0),
        });
        self.mouse_effects.snapshot(pan, self.volumes.mouse_volume())
    }

    /// Overlay text update for the current held keys, or `None` for no
    /// change. `Some(None)` clears the overlay.
    fn overlay_update(&self, keys: &[key::Key], action: Action) -> Option<Option<String>> {
        if !*self.osk.enabled.read() {
            return None;
        }
        match action {
            Action::Press => {
                if keys.len() > 1 && self.modifiers.is_modifier(keys[0]) {
                    let text = keys
                        .iter()
                        .map(|k| k.name)
                        .filter(|name| !name.is_empty())
                        .collect::<Vec<_>>()
                        .join(" + ");
                    Some(Some(text))
                } else {
                    Some(None)
                }
            }
            Action::Release => {
                if keys.is_empty() || !self.modifiers.is_modifier(keys[0]) {
                    Some(None)
                } else {
                    None
                }
            }
        }
    }
}

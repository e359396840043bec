//! Per-device volume state with mute bookkeeping
//!
//! Muting stashes the current volume and restores it on unmute. Shared
//! between the engine's setters, the hotkey handlers and the dispatch
//! path's effect snapshots.

use parking_lot::RwLock;

pub struct VolumeControl {
    keyboard: RwLock<f64>,
    last_keyboard: RwLock<f64>,
    mouse: RwLock<f64>,
    last_mouse: RwLock<f64>,
}

impl VolumeControl {
    pub fn new() -> Self {
        Self {
            keyboard: RwLock::new(1.0),
            last_keyboard: RwLock::new(1.0),
            mouse: RwLock::new(1.0),
            last_mouse: RwLock::new(1.0),
        }
    }

    pub fn keyboard_volume(&self) -> f64 {
        *self.keyboard.read()
    }

    pub fn mouse_volume(&self) -> f64 {
        *self.mouse.read()
    }

    pub fn set_keyboard_volume(&self, volume: f64) {
        *self.keyboard.write() = volume.clamp(0.0, 1.0);
    }

    pub fn set_mouse_volume(&self, volume: f64) {
        *self.mouse.write() = volume.clamp(0.0, 1.0);
    }

    pub fn adjust_keyboard(&self, delta: f64) {
        let current = self.keyboard_volume();
        self.set_keyboard_volume(current + delta);
    }

    pub fn adjust_mouse(&self, delta: f64) {
        let current = self.mouse_volume();
        self.set_mouse_volume(current + delta);
    }

    pub fn mute_keyboard(&self) {
        let mut volume = self.keyboard.write();
        if *volume > 0.0 {
            *self.last_keyboard.write() = *volume;
        }
        *volume = 0.0;
    }

    pub fn unmute_keyboard(&self) {
        *self.keyboard.write() = *self.last_keyboard.read();
    }

    pub fn toggle_mute_keyboard(&self) {
        if self.keyboard_volume() == 0.0 {
            self.unmute_keyboard();
        } else {
            self.mute_keyboard();
        }
    }

    pub fn mute_mouse(&self) {
        let mut volume = self.mouse.write();
        if *volume > 0.0 {
            *self.last_mouse.write() = *volume;
        }
        *volume = 0.0;
    }

    pub fn unmute_mouse(&self) {
        *self.mouse.write() = *self.last_mouse.read();
    }

    pub fn toggle_mute_mouse(&self) {
        if self.mouse_volume() == 0.0 {
            self.unmute_mouse();
        } else {
            self.mute_mouse();
        }
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new()
    }
}

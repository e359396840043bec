//! Global input capture
//!
//! On Linux, reads `/dev/input/event*` devices directly (kernel-level, works
//! on all Wayland compositors). On Windows, installs low-level keyboard and
//! mouse hooks. Other platforms are not supported.
//!
//! Hook callbacks and device readers hand events off through a lock-free
//! SPSC ring (see [`ring`]); a conversion worker turns raw records into
//! typed events and forwards them on a bounded channel.
//!
//! Linux: requires the user to be in the 'input' group.

pub mod ring;

#[cfg(target_os = "linux")]
pub mod evdev_listener;

#[cfg(windows)]
pub mod windows_hook;

use crate::error::InputError;
use crate::key::Key;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the outbound event channels (worker → dispatcher).
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// What happened to a key or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
}

/// A mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
    Middle,
}

impl Button {
    /// Name as referenced by profile files.
    pub fn name(&self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
        }
    }
}

/// A keyboard event observed globally.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    /// Name of the device that generated the event.
    pub device: Arc<str>,
    pub key: Key,
    pub action: Action,
    /// Monotonic timestamp taken when the raw record was converted.
    pub timestamp: Instant,
}

/// A mouse button event observed globally.
#[derive(Debug, Clone)]
pub struct ButtonEvent {
    pub device: Arc<str>,
    pub button: Button,
    pub action: Action,
    pub timestamp: Instant,
}

/// Trait for global keyboard capture implementations.
///
/// `listen` installs the platform hook and returns the event channel.
/// Calling it again tears down the prior installation first. Cancelling the
/// supplied token stops capture and ends the stream.
#[async_trait::async_trait]
pub trait KeyboardListener: Send {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<KeyEvent>, InputError>;
}

/// Trait for global mouse-button capture implementations.
#[async_trait::async_trait]
pub trait MouseListener: Send {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ButtonEvent>, InputError>;
}

/// Creates the keyboard listener for the current platform.
#[cfg(target_os = "linux")]
pub fn create_keyboard_listener() -> Result<Box<dyn KeyboardListener>, InputError> {
    Ok(Box::new(evdev_listener::EvdevKeyboardListener::new()))
}

/// Creates the mouse listener for the current platform.
#[cfg(target_os = "linux")]
pub fn create_mouse_listener() -> Result<Box<dyn MouseListener>, InputError> {
    Ok(Box::new(evdev_listener::EvdevMouseListener::new()))
}

#[cfg(windows)]
pub fn create_keyboard_listener() -> Result<Box<dyn KeyboardListener>, InputError> {
    Ok(Box::new(windows_hook::HookKeyboardListener::new()))
}

#[cfg(windows)]
pub fn create_mouse_listener() -> Result<Box<dyn MouseListener>, InputError> {
    Ok(Box::new(windows_hook::HookMouseListener::new()))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn create_keyboard_listener() -> Result<Box<dyn KeyboardListener>, InputError> {
    Err(InputError::UnsupportedPlatform)
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn create_mouse_listener() -> Result<Box<dyn MouseListener>, InputError> {
    Err(InputError::UnsupportedPlatform)
}

/// A [`KeyboardListener`] fed by hand; used by hosts that capture input
/// themselves and by tests.
pub struct ChannelKeyboardListener {
    receiver: Option<mpsc::Receiver<KeyEvent>>,
}

impl ChannelKeyboardListener {
    /// Returns the listener and the sender used to feed it.
    pub fn new() -> (Self, mpsc::Sender<KeyEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { receiver: Some(rx) }, tx)
    }
}

#[async_trait::async_trait]
impl KeyboardListener for ChannelKeyboardListener {
    async fn listen(
        &mut self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<KeyEvent>, InputError> {
        self.receiver
            .take()
            .ok_or_else(|| InputError::HookFailed("listener already started".to_string()))
    }
}

/// A [`MouseListener`] fed by hand; counterpart of
/// [`ChannelKeyboardListener`].
pub struct ChannelMouseListener {
    receiver: Option<mpsc::Receiver<ButtonEvent>>,
}

impl ChannelMouseListener {
    pub fn new() -> (Self, mpsc::Sender<ButtonEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { receiver: Some(rx) }, tx)
    }
}

#[async_trait::async_trait]
impl MouseListener for ChannelMouseListener {
    async fn listen(
        &mut self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ButtonEvent>, InputError> {
        self.receiver
            .take()
            .ok_or_else(|| InputError::HookFailed("listener already started".to_string()))
    }
}

/// Tracks events dropped on a full outbound channel and warns at a bounded
/// rate so a stuck consumer cannot flood the log.
pub(crate) struct DropCounter {
    label: &'static str,
    dropped: u64,
    last_warn: Option<Instant>,
}

impl DropCounter {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            dropped: 0,
            last_warn: None,
        }
    }

    pub(crate) fn record(&mut self) {
        self.dropped += 1;
        let now = Instant::now();
        let due = match self.last_warn {
            None => true,
            Some(at) => now.duration_since(at).as_secs() >= 1,
        };
        if due {
            tracing::warn!(
                channel = self.label,
                dropped = self.dropped,
                "event channel full, dropping newest event"
            );
            self.last_warn = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_names() {
        assert_eq!(Button::Left.name(), "left");
        assert_eq!(Button::Right.name(), "right");
        assert_eq!(Button::Middle.name(), "middle");
    }
}

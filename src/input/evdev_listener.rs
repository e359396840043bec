//! evdev-based global input capture
//!
//! Uses the Linux evdev interface to observe key and button events at the
//! kernel level. This works on all Wayland compositors because it bypasses
//! the display server.
//!
//! Each selected device gets a dedicated reader thread writing raw records
//! into its own SPSC ring; a single conversion worker per listener drains
//! the rings, builds typed events and forwards them on the bounded outbound
//! channel.

use super::ring::Ring;
use super::{
    Action, Button, ButtonEvent, DropCounter, KeyEvent, KeyboardListener, MouseListener,
    EVENT_CHANNEL_CAPACITY,
};
use crate::error::InputError;
use crate::key;
use evdev::{Device, EventType, InputEventKind, Key as EvdevKey};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Linux evdev button codes (input-event-codes.h).
const BTN_LEFT: u16 = 0x110;
const BTN_RIGHT: u16 = 0x111;
const BTN_MIDDLE: u16 = 0x112;

/// Keys every real keyboard supports; filters out HID oddballs that
/// advertise EV_KEY without being keyboards (power buttons, headsets).
const COMMON_KEYBOARD_KEYS: [EvdevKey; 5] = [
    EvdevKey::KEY_ESC,
    EvdevKey::KEY_A,
    EvdevKey::KEY_C,
    EvdevKey::KEY_B,
    EvdevKey::KEY_ENTER,
];

/// Transient read failures tolerated per device before giving up on it.
const MAX_READ_RETRIES: u32 = 5;
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Raw record copied out of the kernel event, small enough for the ring.
#[derive(Debug, Clone, Copy, Default)]
struct RawRecord {
    code: u16,
    value: i32,
}

struct DeviceRing {
    name: Arc<str>,
    ring: Arc<Ring<RawRecord>>,
}

/// evdev-based keyboard listener
pub struct EvdevKeyboardListener {
    active: Option<CancellationToken>,
}

impl EvdevKeyboardListener {
    pub fn new() -> Self {
        Self { active: None }
    }
}

impl Default for EvdevKeyboardListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KeyboardListener for EvdevKeyboardListener {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<KeyEvent>, InputError> {
        // Tear down any prior installation before installing anew.
        if let Some(prev) = self.active.take() {
            prev.cancel();
        }
        let token = cancel.child_token();
        self.active = Some(token.clone());

        let devices = scan_devices(is_keyboard)?;
        if devices.is_empty() {
            return Err(InputError::NoKeyboard);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let rings = attach_readers(devices, &token)?;

        let worker_token = token.clone();
        spawn_named("thock-key-events", move || {
            conversion_worker(rings, tx, worker_token, "keyboard", map_key_event);
        })?;

        Ok(rx)
    }
}

/// evdev-based mouse button listener
pub struct EvdevMouseListener {
    active: Option<CancellationToken>,
}

impl EvdevMouseListener {
    pub fn new() -> Self {
        Self { active: None }
    }
}

impl Default for EvdevMouseListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MouseListener for EvdevMouseListener {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ButtonEvent>, InputError> {
        if let Some(prev) = self.active.take() {
            prev.cancel();
        }
        let token = cancel.child_token();
        self.active = Some(token.clone());

        let devices = scan_devices(is_pointer)?;
        if devices.is_empty() {
            return Err(InputError::NoPointer);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let rings = attach_readers(devices, &token)?;

        let worker_token = token.clone();
        spawn_named("thock-button-events", move || {
            conversion_worker(rings, tx, worker_token, "mouse", map_button_event);
        })?;

        Ok(rx)
    }
}

fn map_key_event(device: &Arc<str>, record: RawRecord) -> Option<KeyEvent> {
    let action = match record.value {
        1 => Action::Press,
        0 => Action::Release,
        // Key repeat/autorepeat - treat as press
        2 => Action::Press,
        _ => return None,
    };
    Some(KeyEvent {
        device: device.clone(),
        key: key::find_key_code(u32::from(record.code)),
        action,
        timestamp: Instant::now(),
    })
}

fn map_button_event(device: &Arc<str>, record: RawRecord) -> Option<ButtonEvent> {
    let button = match record.code {
        BTN_LEFT => Button::Left,
        BTN_RIGHT => Button::Right,
        BTN_MIDDLE => Button::Middle,
        _ => return None,
    };
    let action = match record.value {
        1 | 2 => Action::Press,
        0 => Action::Release,
        _ => return None,
    };
    Some(ButtonEvent {
        device: device.clone(),
        button,
        action,
        timestamp: Instant::now(),
    })
}

/// Spawns a reader thread per device, each writing into its own ring.
fn attach_readers(
    devices: Vec<Device>,
    token: &CancellationToken,
) -> Result<Vec<DeviceRing>, InputError> {
    let mut rings = Vec::with_capacity(devices.len());
    for device in devices {
        let name: Arc<str> = Arc::from(device.name().unwrap_or("unknown"));
        let ring = Ring::new();
        rings.push(DeviceRing {
            name: name.clone(),
            ring: ring.clone(),
        });

        set_nonblocking(&device);

        let reader_token = token.clone();
        spawn_named("thock-evdev-reader", move || {
            device_reader(device, ring, reader_token);
        })?;
        tracing::debug!(device = %name, "attached input device");
    }
    Ok(rings)
}

/// Reads raw events from one device into its ring until cancelled.
/// Transient failures are retried up to [`MAX_READ_RETRIES`] times with a
/// backoff before the device is abandoned.
fn device_reader(mut device: Device, ring: Arc<Ring<RawRecord>>, cancel: CancellationToken) {
    let mut retries = 0u32;
    let device_name = device.name().unwrap_or("unknown").to_string();

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match device.fetch_events() {
            Ok(events) => {
                retries = 0;
                for event in events {
                    if let InputEventKind::Key(k) = event.kind() {
                        ring.push(RawRecord {
                            code: k.code(),
                            value: event.value(),
                        });
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No events pending; avoid busy-waiting.
                std::thread::sleep(Duration::from_millis(2));
            }
            Err(e) => {
                if retries >= MAX_READ_RETRIES {
                    tracing::warn!(
                        device = device_name,
                        error = %e,
                        "giving up on input device after repeated read failures"
                    );
                    return;
                }
                retries += 1;
                std::thread::sleep(READ_RETRY_BACKOFF);
            }
        }
    }
}

/// Drains the device rings, converts raw records and forwards events.
/// A full outbound channel drops the newest event with a counted warning;
/// cancellation is checked explicitly so the drop path never races it.
fn conversion_worker<T, F>(
    rings: Vec<DeviceRing>,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
    label: &'static str,
    map: F,
) where
    F: Fn(&Arc<str>, RawRecord) -> Option<T>,
{
    let mut drops = DropCounter::new(label);

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(worker = label, "conversion worker stopped");
            return;
        }

        let mut drained = false;
        for dr in &rings {
            while let Some(record) = dr.ring.pop() {
                drained = true;
                let Some(event) = map(&dr.name, record) else {
                    continue;
                };
                match tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => drops.record(),
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
        }

        if !drained {
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}

/// Enumerates `/dev/input/event*` devices matching the given filter.
fn scan_devices(filter: fn(&Device) -> bool) -> Result<Vec<Device>, InputError> {
    let mut selected = Vec::new();

    let entries = std::fs::read_dir("/dev/input")
        .map_err(|e| InputError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| InputError::DeviceAccess(e.to_string()))?;
        let path = entry.path();

        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);
        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                if filter(&device) {
                    tracing::debug!(
                        path = %path.display(),
                        name = device.name().unwrap_or("unknown"),
                        "selected input device"
                    );
                    selected.push(device);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(InputError::DeviceAccess(path.display().to_string()));
                }
                // Other errors (device busy, etc.) - just skip
                tracing::trace!(path = %path.display(), error = %e, "skipping device");
            }
        }
    }

    Ok(selected)
}

fn is_keyboard(device: &Device) -> bool {
    if !device.supported_events().contains(EventType::KEY) {
        return false;
    }
    device
        .supported_keys()
        .map(|keys| COMMON_KEYBOARD_KEYS.iter().all(|k| keys.contains(*k)))
        .unwrap_or(false)
}

fn is_pointer(device: &Device) -> bool {
    if !device.supported_events().contains(EventType::KEY) {
        return false;
    }
    device
        .supported_keys()
        .map(|keys| {
            keys.contains(EvdevKey::BTN_LEFT)
                && keys.contains(EvdevKey::BTN_RIGHT)
                && keys.contains(EvdevKey::BTN_MIDDLE)
        })
        .unwrap_or(false)
}

/// Set the device fd to non-blocking so `fetch_events` doesn't block the
/// reader past a cancellation.
fn set_nonblocking(device: &Device) {
    let fd = device.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags != -1 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

fn spawn_named<F>(name: &str, f: F) -> Result<(), InputError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map(|_| ())
        .map_err(|e| InputError::HookFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key_event_values() {
        let dev: Arc<str> = Arc::from("test");
        let press = map_key_event(&dev, RawRecord { code: 30, value: 1 }).unwrap();
        assert_eq!(press.action, Action::Press);
        assert_eq!(press.key, crate::key::A);

        let release = map_key_event(&dev, RawRecord { code: 30, value: 0 }).unwrap();
        assert_eq!(release.action, Action::Release);

        // Autorepeat maps to press
        let repeat = map_key_event(&dev, RawRecord { code: 30, value: 2 }).unwrap();
        assert_eq!(repeat.action, Action::Press);

        assert!(map_key_event(&dev, RawRecord { code: 30, value: 7 }).is_none());
    }

    #[test]
    fn test_map_button_event_codes() {
        let dev: Arc<str> = Arc::from("test");
        let left = map_button_event(
            &dev,
            RawRecord {
                code: BTN_LEFT,
                value: 1,
            },
        )
        .unwrap();
        assert_eq!(left.button, Button::Left);

        let middle = map_button_event(
            &dev,
            RawRecord {
                code: BTN_MIDDLE,
                value: 0,
            },
        )
        .unwrap();
        assert_eq!(middle.button, Button::Middle);
        assert_eq!(middle.action, Action::Release);

        // Non-button key codes on pointer devices are ignored
        assert!(map_button_event(&dev, RawRecord { code: 30, value: 1 }).is_none());
    }
}

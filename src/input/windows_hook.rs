//! Low-level Windows hook input capture
//!
//! Installs WH_KEYBOARD_LL / WH_MOUSE_LL hooks. Hook callbacks are invoked
//! on the thread that installed the hook, so the hook and its message loop
//! run on one dedicated OS thread; cancellation posts WM_QUIT to that
//! thread. The callback copies the payload, chains the next hook and writes
//! the copy into an SPSC ring - nothing else is permitted there, the OS
//! watchdog will silently remove a slow hook.

use super::ring::Ring;
use super::{
    Action, Button, ButtonEvent, DropCounter, KeyEvent, KeyboardListener, MouseListener,
    EVENT_CHANNEL_CAPACITY,
};
use crate::error::InputError;
use crate::key::{self, Key};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use windows_sys::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WH_MOUSE_LL,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_QUIT, WM_RBUTTONDOWN,
    WM_RBUTTONUP,
};

/// KBDLLHOOKSTRUCT flag set on key-up transitions.
const LLKHF_UP: u32 = 0x80;

/// How long to wait for the hook thread to report a successful install.
const HOOK_INSTALL_TIMEOUT: Duration = Duration::from_secs(1);

const KEYBOARD_DEVICE: &str = "Windows (WH_KEYBOARD_LL Hook)";
const MOUSE_DEVICE: &str = "Windows (WH_MOUSE_LL Hook)";

#[derive(Debug, Clone, Copy, Default)]
struct KeyRecord {
    vk: u32,
    flags: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct MouseRecord {
    message: u32,
}

// Hook callbacks cannot capture state, so the rings live for the process
// lifetime. Only one hook of each type is ever installed at a time.
static KEYBOARD_RING: OnceLock<Arc<Ring<KeyRecord>>> = OnceLock::new();
static MOUSE_RING: OnceLock<Arc<Ring<MouseRecord>>> = OnceLock::new();

fn keyboard_ring() -> &'static Arc<Ring<KeyRecord>> {
    KEYBOARD_RING.get_or_init(Ring::new)
}

fn mouse_ring() -> &'static Arc<Ring<MouseRecord>> {
    MOUSE_RING.get_or_init(Ring::new)
}

unsafe extern "system" fn keyboard_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        // lParam is only valid during this call; copy before chaining.
        let kb = *(lparam as *const KBDLLHOOKSTRUCT);
        let result = CallNextHookEx(0, code, wparam, lparam);
        keyboard_ring().push(KeyRecord {
            vk: kb.vkCode,
            flags: kb.flags,
        });
        return result;
    }
    CallNextHookEx(0, code, wparam, lparam)
}

unsafe extern "system" fn mouse_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        // wParam carries the button message; the MSLLHOOKSTRUCT payload is
        // not needed for button events.
        let result = CallNextHookEx(0, code, wparam, lparam);
        mouse_ring().push(MouseRecord {
            message: wparam as u32,
        });
        return result;
    }
    CallNextHookEx(0, code, wparam, lparam)
}

/// Installs a low-level hook on a dedicated thread and runs its message
/// loop until WM_QUIT. Reports the thread id (for cancellation posts) back
/// through `ready_tx` once the hook is in place.
fn run_hook_thread(
    hook_id: i32,
    callback: unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT,
    ready_tx: std::sync::mpsc::Sender<Result<u32, InputError>>,
) {
    unsafe {
        let hook = SetWindowsHookExW(hook_id, Some(callback), 0, 0);
        if hook == 0 {
            let _ = ready_tx.send(Err(InputError::HookFailed(format!(
                "SetWindowsHookExW({hook_id}) failed"
            ))));
            return;
        }

        let _ = ready_tx.send(Ok(GetCurrentThreadId()));

        let mut msg: MSG = std::mem::zeroed();
        loop {
            // Blocks until a message arrives; WM_QUIT returns 0, error -1.
            let ret = GetMessageW(&mut msg, 0, 0, 0);
            if ret == 0 || ret == -1 {
                break;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        UnhookWindowsHookEx(hook);
        tracing::debug!(hook = hook_id, "hook thread exited");
    }
}

/// Posts WM_QUIT to the hook thread; the post is retried once.
fn post_quit(thread_id: u32) {
    unsafe {
        if PostThreadMessageW(thread_id, WM_QUIT, 0, 0) == 0
            && PostThreadMessageW(thread_id, WM_QUIT, 0, 0) == 0
        {
            tracing::warn!(thread_id, "failed to post WM_QUIT to hook thread");
        }
    }
}

/// Spawns the hook thread, waits for the install handshake (bounded), and
/// wires the cancellation token to a WM_QUIT post.
fn install_hook(
    hook_id: i32,
    callback: unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT,
    cancel: &CancellationToken,
) -> Result<(), InputError> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    std::thread::Builder::new()
        .name("thock-hook".to_string())
        .spawn(move || run_hook_thread(hook_id, callback, ready_tx))
        .map_err(|e| InputError::HookFailed(e.to_string()))?;

    let thread_id = match ready_rx.recv_timeout(HOOK_INSTALL_TIMEOUT) {
        Ok(Ok(tid)) => tid,
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(InputError::HookTimeout),
    };

    let token = cancel.clone();
    tokio::spawn(async move {
        token.cancelled().await;
        post_quit(thread_id);
    });

    Ok(())
}

/// Drains a hook ring into the outbound channel until cancelled.
fn conversion_worker<R, T, F>(
    ring: &'static Arc<Ring<R>>,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
    label: &'static str,
    map: F,
) where
    R: Copy + Default + Send + 'static,
    F: Fn(R) -> Option<T>,
{
    let mut drops = DropCounter::new(label);

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(worker = label, "conversion worker stopped");
            return;
        }

        match ring.pop() {
            Some(record) => {
                let Some(event) = map(record) else { continue };
                match tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => drops.record(),
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
            None => std::thread::sleep(Duration::from_micros(100)),
        }
    }
}

/// WH_KEYBOARD_LL based keyboard listener
pub struct HookKeyboardListener {
    active: Option<CancellationToken>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl HookKeyboardListener {
    pub fn new() -> Self {
        Self {
            active: None,
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl KeyboardListener for HookKeyboardListener {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<KeyEvent>, InputError> {
        // The ring has exactly one consumer: the prior worker must be gone
        // before a new one takes over.
        if let Some(prev) = self.active.take() {
            prev.cancel();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let token = cancel.child_token();
        self.active = Some(token.clone());

        // Discard anything left from a prior installation.
        while keyboard_ring().pop().is_some() {}

        install_hook(WH_KEYBOARD_LL, keyboard_hook, &token)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let device: Arc<str> = Arc::from(KEYBOARD_DEVICE);
        let worker_token = token.clone();
        let worker = std::thread::Builder::new()
            .name("thock-key-events".to_string())
            .spawn(move || {
                conversion_worker(keyboard_ring(), tx, worker_token, "keyboard", move |r| {
                    map_key_record(&device, r)
                });
            })
            .map_err(|e| InputError::HookFailed(e.to_string()))?;
        self.worker = Some(worker);

        Ok(rx)
    }
}

/// WH_MOUSE_LL based mouse listener
pub struct HookMouseListener {
    active: Option<CancellationToken>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl HookMouseListener {
    pub fn new() -> Self {
        Self {
            active: None,
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl MouseListener for HookMouseListener {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ButtonEvent>, InputError> {
        if let Some(prev) = self.active.take() {
            prev.cancel();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let token = cancel.child_token();
        self.active = Some(token.clone());

        while mouse_ring().pop().is_some() {}

        install_hook(WH_MOUSE_LL, mouse_hook, &token)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let device: Arc<str> = Arc::from(MOUSE_DEVICE);
        let worker_token = token.clone();
        let worker = std::thread::Builder::new()
            .name("thock-button-events".to_string())
            .spawn(move || {
                conversion_worker(mouse_ring(), tx, worker_token, "mouse", move |r| {
                    map_mouse_record(&device, r)
                });
            })
            .map_err(|e| InputError::HookFailed(e.to_string()))?;
        self.worker = Some(worker);

        Ok(rx)
    }
}

fn map_key_record(device: &Arc<str>, record: KeyRecord) -> Option<KeyEvent> {
    let action = if record.flags & LLKHF_UP != 0 {
        Action::Release
    } else {
        // Repeated WM_KEYDOWN (autorepeat) arrives as another press; the
        // dispatcher deduplicates held keys.
        Action::Press
    };
    Some(KeyEvent {
        device: device.clone(),
        key: vk_to_key(record.vk),
        action,
        timestamp: Instant::now(),
    })
}

fn map_mouse_record(device: &Arc<str>, record: MouseRecord) -> Option<ButtonEvent> {
    let (button, action) = match record.message {
        WM_LBUTTONDOWN => (Button::Left, Action::Press),
        WM_LBUTTONUP => (Button::Left, Action::Release),
        WM_RBUTTONDOWN => (Button::Right, Action::Press),
        WM_RBUTTONUP => (Button::Right, Action::Release),
        WM_MBUTTONDOWN => (Button::Middle, Action::Press),
        WM_MBUTTONUP => (Button::Middle, Action::Release),
        _ => return None,
    };
    Some(ButtonEvent {
        device: device.clone(),
        button,
        action,
        timestamp: Instant::now(),
    })
}

/// Translates a Windows virtual-key code into the canonical key space.
/// Unmapped codes are offset out of the evdev range so they cannot collide
/// with a named key.
fn vk_to_key(vk: u32) -> Key {
    let mapped = match vk {
        0x1B => key::ESCAPE,
        0x70..=0x79 => key::find_key_code(59 + (vk - 0x70)), // F1-F10
        0x7A => key::F11,
        0x7B => key::F12,
        0x7C..=0x87 => key::find_key_code(183 + (vk - 0x7C)), // F13-F24
        0x30 => key::NUMBER0,
        0x31..=0x39 => key::find_key_code(2 + (vk - 0x31)), // 1-9
        0x41 => key::A,
        0x42 => key::B,
        0x43 => key::C,
        0x44 => key::D,
        0x45 => key::E,
        0x46 => key::F,
        0x47 => key::G,
        0x48 => key::H,
        0x49 => key::I,
        0x4A => key::J,
        0x4B => key::K,
        0x4C => key::L,
        0x4D => key::M,
        0x4E => key::N,
        0x4F => key::O,
        0x50 => key::P,
        0x51 => key::Q,
        0x52 => key::R,
        0x53 => key::S,
        0x54 => key::T,
        0x55 => key::U,
        0x56 => key::V,
        0x57 => key::W,
        0x58 => key::X,
        0x59 => key::Y,
        0x5A => key::Z,
        0xBD => key::MINUS,
        0xBB => key::PLUS,
        0x08 => key::BACKSPACE,
        0x09 => key::TAB,
        0xDB => key::LEFT_BRACKET,
        0xDD => key::RIGHT_BRACKET,
        0x0D => key::ENTER,
        0xA2 => key::LEFT_CONTROL,
        0xA3 => key::RIGHT_CONTROL,
        0xBA => key::SEMICOLON,
        0xDE => key::QUOTE,
        0xC0 => key::BACKTICK,
        0xA0 => key::LEFT_SHIFT,
        0xA1 => key::RIGHT_SHIFT,
        0xDC => key::BACKSLASH,
        0xBC => key::COMMA,
        0xBE => key::PERIOD,
        0xBF => key::SLASH,
        0x6A => key::NUMPAD_MULTIPLY,
        0xA4 => key::LEFT_ALT,
        0xA5 => key::RIGHT_ALT,
        0x20 => key::SPACE,
        0x14 => key::CAPS_LOCK,
        0x90 => key::NUM_LOCK,
        0x91 => key::SCROLL_LOCK,
        0x60 => key::NUMPAD0,
        0x61 => key::NUMPAD1,
        0x62 => key::NUMPAD2,
        0x63 => key::NUMPAD3,
        0x64 => key::NUMPAD4,
        0x65 => key::NUMPAD5,
        0x66 => key::NUMPAD6,
        0x67 => key::NUMPAD7,
        0x68 => key::NUMPAD8,
        0x69 => key::NUMPAD9,
        0x6B => key::NUMPAD_ADD,
        0x6D => key::NUMPAD_SUBTRACT,
        0x6E => key::NUMPAD_DECIMAL,
        0x6F => key::NUMPAD_DIVIDE,
        0x2C => key::PRINT_SCREEN,
        0x24 => key::HOME,
        0x26 => key::UP,
        0x21 => key::PAGE_UP,
        0x25 => key::LEFT,
        0x27 => key::RIGHT,
        0x23 => key::END,
        0x28 => key::DOWN,
        0x22 => key::PAGE_DOWN,
        0x2D => key::INSERT,
        0x2E => key::DELETE,
        0x13 => key::PAUSE,
        0x5B => key::LEFT_WIN,
        0x5C => key::RIGHT_WIN,
        _ => Key {
            code: 0x1000 + vk,
            name: "",
        },
    };
    mapped
}

//! Error types for thock
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Engine is already enabled")]
    AlreadyEnabled,

    #[error("Engine is not enabled")]
    NotEnabled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global input capture
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Global input capture is not supported on this platform")]
    UnsupportedPlatform,

    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("No pointer device found in /dev/input/")]
    NoPointer,

    #[error("Failed to install input hook: {0}")]
    HookFailed(String),

    #[error("Timed out waiting for the input hook to install")]
    HookTimeout,

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to audio decoding and playback
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Unsupported audio format: {0} (only .mp3 and .wav are supported)")]
    UnsupportedFormat(String),

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to open audio output device: {0}")]
    OutputDevice(String),

    #[error("Audio playback error: {0}")]
    Playback(String),
}

/// Errors related to profile loading and mutation
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile not found: '{0}'")]
    NotFound(String),

    #[error("Profile '{name}' is a {actual} profile, expected {expected}")]
    DeviceMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Profile '{profile}' references unknown source id '{source_id}'")]
    SourceMissing { profile: String, source_id: String },

    #[error("Profile '{0}' has no sources")]
    NoSources(String),

    #[error("A profile named '{0}' already exists")]
    NameCollision(String),

    #[error("Archive entry '{0}' escapes the extraction root")]
    PathTraversal(String),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to application rules
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Invalid glob pattern: '{0}'")]
    InvalidPattern(String),

    #[error("Failed to parse rules file: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to hotkey configuration and dispatch
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("No handler registered for action '{action}' on target '{target}'")]
    HandlerNotFound { action: String, target: String },

    #[error("Invalid hotkey value '{0}': expected a number")]
    InvalidValue(String),

    #[error("Failed to parse hotkeys file: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the top-level error
pub type Result<T> = std::result::Result<T, Error>;

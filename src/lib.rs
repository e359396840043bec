//! Thock: profile-driven keyboard and mouse sounds
//!
//! This library provides the core engine for:
//! - Capturing global key and mouse-button events (evdev on Linux,
//!   low-level hooks on Windows) with a lock-free hand-off
//! - Resolving each event to a cached audio buffer through a profile
//! - Applying a per-playback effect chain (pitch, pan, EQ, doppler, volume)
//! - Mixing concurrent playbacks into one output stream
//! - Dispatching modifier-combo hotkeys (mute, volume steps)
//! - Switching profiles when the foreground application changes
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────┐   SPSC ring   ┌──────────────┐   bounded channel
//!  │  InputSource │ ────────────▶ │  conversion  │ ──────────────────┐
//!  │ (hook/evdev) │               │    worker    │                   │
//!  └─────────────┘                └──────────────┘                   ▼
//!                                                           ┌───────────────┐
//!  ┌─────────────┐  focus events                            │    Engine     │
//!  │ FocusSource  │ ────────────────────────────────────────▶│  dispatcher  │
//!  └─────────────┘                                           └──────┬────────┘
//!                                                 ┌─────────────────┼─────────────────┐
//!                                                 ▼                 ▼                 ▼
//!                                          ┌────────────┐   ┌──────────────┐   ┌───────────┐
//!                                          │  Hotkeys   │   │   Resolver   │   │  Overlay  │
//!                                          │  matcher   │   │ (profile →   │   │  (host)   │
//!                                          └────────────┘   │   buffer)    │   └───────────┘
//!                                                            └──────┬───────┘
//!                                                                   ▼
//!                                                            ┌──────────────┐
//!                                                            │ EffectChain  │
//!                                                            │ pitch→pan→eq │
//!                                                            │ →doppler→vol │
//!                                                            └──────┬───────┘
//!                                                                   ▼
//!                                                            ┌──────────────┐
//!                                                            │    Mixer     │
//!                                                            │   (rodio)    │
//!                                                            └──────────────┘
//! ```
//!
//! The engine is a library: CLI, tray, GUI and overlay rendering belong to
//! the host, which talks to [`Engine`] and implements the traits in
//! [`overlay`] and [`focus`].

pub mod audio;
pub mod engine;
pub mod error;
pub mod focus;
pub mod hotkeys;
pub mod input;
pub mod key;
pub mod overlay;
pub mod profile;
pub mod resolve;
pub mod rules;

pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};

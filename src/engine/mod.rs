//! The engine: owns every collaborator and coordinates the pipeline
//!
//! Created once at startup; `enable` installs the input hooks and spawns
//! one worker per event stream, `disable` cancels and joins them. Every
//! tunable sits behind its own lock so user-triggered setters never stall
//! dispatch.

pub mod effects;
pub mod volume;

mod handlers;
mod workers;

pub use effects::{DeviceEffects, DopplerState, EqualizerState, PanMode, PanState, PitchShiftState};
pub use volume::VolumeControl;

use crate::audio::library::AudioLibrary;
use crate::audio::mixer::{AudioPlayer, RodioPlayer};
use crate::error::{Error, Result};
use crate::focus::{self, FocusSource};
use crate::hotkeys::{self, HotkeyFired, HotkeyGroup, HotkeyMatcher};
use crate::input::{self, KeyboardListener, MouseListener};
use crate::key::{Key, ModifierSet};
use crate::overlay::{NoopOverlay, OverlayConfig, OverlayRenderer};
use crate::profile::store::ProfileStore;
use crate::profile::DeviceType;
use crate::resolve::ProfileBundle;
use crate::rules::{Profiles, RuleStore};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// On-screen-keys helper state, shared with the hotkey handlers.
#[derive(Default)]
pub(crate) struct OskState {
    pub(crate) enabled: RwLock<bool>,
    pub(crate) config: RwLock<OverlayConfig>,
}

/// Construction parameters. Collaborators left `None` fall back to the
/// platform implementations (audio output, global hooks) or to no-ops
/// (overlay); hosts and tests inject their own.
pub struct EngineConfig {
    pub root_dir: PathBuf,
    pub player: Option<Box<dyn AudioPlayer>>,
    pub overlay: Option<Box<dyn OverlayRenderer>>,
    pub keyboard_listener: Option<Box<dyn KeyboardListener>>,
    pub mouse_listener: Option<Box<dyn MouseListener>>,
    pub focus_source: Option<Box<dyn FocusSource>>,
}

impl EngineConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            player: None,
            overlay: None,
            keyboard_listener: None,
            mouse_listener: None,
            focus_source: None,
        }
    }
}

/// State shared between the engine surface and its workers.
pub(crate) struct EngineShared {
    pub(crate) profiles: ProfileStore,
    pub(crate) rules: RuleStore,
    pub(crate) hotkeys: HotkeyMatcher,
    pub(crate) library: AudioLibrary,
    pub(crate) player: Box<dyn AudioPlayer>,
    pub(crate) overlay: Box<dyn OverlayRenderer>,
    pub(crate) volumes: Arc<VolumeControl>,
    pub(crate) osk: Arc<OskState>,
    pub(crate) modifiers: ModifierSet,
    pub(crate) keyboard_effects: DeviceEffects,
    pub(crate) mouse_effects: DeviceEffects,
    pub(crate) keyboard_bundle: RwLock<Option<Arc<ProfileBundle>>>,
    pub(crate) mouse_bundle: RwLock<Option<Arc<ProfileBundle>>>,
    pub(crate) keys_down: RwLock<Vec<Key>>,
    pub(crate) current_profiles: RwLock<Profiles>,
}

struct RunState {
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// The process-wide coordinator.
pub struct Engine {
    root: PathBuf,
    shared: Arc<EngineShared>,
    keyboard_listener: Mutex<Box<dyn KeyboardListener>>,
    mouse_listener: Mutex<Option<Box<dyn MouseListener>>>,
    focus_source: Mutex<Option<Box<dyn FocusSource>>>,
    run: Mutex<Option<RunState>>,
}

impl Engine {
    /// Loads profiles, rules and hotkeys from the root directory, prepares
    /// the default profiles and builds the collaborators. Any failure
    /// (missing default profile, mismatched device type, bad audio)
    /// surfaces here and leaves nothing running.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let root = config.root_dir;
        std::fs::create_dir_all(&root)?;

        let profiles = ProfileStore::load(root.join("profiles"))?;
        let rules = RuleStore::load(&root)?;
        let groups = hotkeys::load_groups(&root)?;

        let volumes = Arc::new(VolumeControl::new());
        let osk = Arc::new(OskState::default());
        let registry = handlers::builtin_registry(volumes.clone(), osk.clone());
        let delegates: Vec<hotkeys::matcher::Delegate> =
            vec![Arc::new(|event: HotkeyFired| {
                tracing::info!(key = %event.key, action = ?event.action.action, "hotkey processed");
            })];
        let matcher = HotkeyMatcher::new(groups, registry, delegates);

        let shared = Arc::new(EngineShared {
            profiles,
            rules,
            hotkeys: matcher,
            library: AudioLibrary::new(),
            player: config
                .player
                .unwrap_or_else(|| Box::new(RodioPlayer::new())),
            overlay: config.overlay.unwrap_or_else(|| Box::new(NoopOverlay)),
            volumes,
            osk,
            modifiers: ModifierSet::new(),
            keyboard_effects: DeviceEffects::default(),
            mouse_effects: DeviceEffects::default(),
            keyboard_bundle: RwLock::new(None),
            mouse_bundle: RwLock::new(None),
            keys_down: RwLock::new(Vec::new()),
            current_profiles: RwLock::new(Profiles::default()),
        });

        // Default profiles must be valid at construction.
        let defaults = shared.rules.default_profiles();
        let keyboard = shared.prepare_slot(defaults.keyboard.as_deref(), DeviceType::Keyboard)?;
        let mouse = shared.prepare_slot(defaults.mouse.as_deref(), DeviceType::Mouse)?;
        *shared.keyboard_bundle.write() = keyboard;
        *shared.mouse_bundle.write() = mouse;
        *shared.current_profiles.write() = defaults;

        let keyboard_listener = match config.keyboard_listener {
            Some(listener) => listener,
            None => input::create_keyboard_listener()?,
        };
        let mouse_listener = match config.mouse_listener {
            Some(listener) => Some(listener),
            None => match input::create_mouse_listener() {
                Ok(listener) => Some(listener),
                Err(e) => {
                    tracing::warn!(error = %e, "mouse capture unavailable");
                    None
                }
            },
        };
        let focus_source = config.focus_source.or_else(focus::create_focus_source);

        Ok(Self {
            root,
            shared,
            keyboard_listener: Mutex::new(keyboard_listener),
            mouse_listener: Mutex::new(mouse_listener),
            focus_source: Mutex::new(focus_source),
            run: Mutex::new(None),
        })
    }

    /// Installs the input hooks and spawns the event workers. Returns
    /// [`Error::AlreadyEnabled`] when already on. A keyboard capture
    /// failure aborts the whole enable; mouse and focus captures are
    /// optional and only warn.
    pub async fn enable(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(Error::AlreadyEnabled);
        }

        let cancel = CancellationToken::new();
        let mut workers = Vec::new();

        let keyboard_events = {
            let mut listener = self.keyboard_listener.lock().await;
            match listener.listen(cancel.clone()).await {
                Ok(events) => events,
                Err(e) => {
                    cancel.cancel();
                    return Err(e.into());
                }
            }
        };
        workers.push(tokio::spawn(workers::keyboard_worker(
            self.shared.clone(),
            keyboard_events,
            cancel.clone(),
        )));

        if let Some(listener) = self.mouse_listener.lock().await.as_mut() {
            match listener.listen(cancel.clone()).await {
                Ok(events) => workers.push(tokio::spawn(workers::mouse_worker(
                    self.shared.clone(),
                    events,
                    cancel.clone(),
                ))),
                Err(e) => tracing::warn!(error = %e, "failed to start mouse capture"),
            }
        }

        if let Some(source) = self.focus_source.lock().await.as_mut() {
            match source.listen(cancel.clone()).await {
                Ok(events) => workers.push(tokio::spawn(workers::focus_worker(
                    self.shared.clone(),
                    events,
                    cancel.clone(),
                ))),
                Err(e) => tracing::warn!(error = %e, "failed to start focus watcher"),
            }
        }

        *run = Some(RunState { cancel, workers });
        Ok(())
    }

    /// Cancels the workers and joins them all before returning. Returns
    /// [`Error::NotEnabled`] when already off.
    pub async fn disable(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        let Some(state) = run.take() else {
            return Err(Error::NotEnabled);
        };

        state.cancel.cancel();
        for worker in state.workers {
            let _ = worker.await;
        }
        Ok(())
    }

    pub async fn is_enabled(&self) -> bool {
        self.run.lock().await.is_some()
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// The profile library (list, find, delete, import, export).
    pub fn profiles(&self) -> &ProfileStore {
        &self.shared.profiles
    }

    /// The application rule store (CRUD, defaults).
    pub fn rules(&self) -> &RuleStore {
        &self.shared.rules
    }

    /// Swaps the keyboard profile. The new profile is validated and fully
    /// decoded before the swap; on failure the prior profile stays active.
    pub fn set_keyboard_profile(&self, name: Option<&str>) -> Result<()> {
        let bundle = self
            .shared
            .prepare_slot(name, DeviceType::Keyboard)?;
        *self.shared.keyboard_bundle.write() = bundle;
        self.shared.current_profiles.write().keyboard = name.map(str::to_string);
        Ok(())
    }

    /// Swaps the mouse profile; same contract as [`set_keyboard_profile`].
    ///
    /// [`set_keyboard_profile`]: Engine::set_keyboard_profile
    pub fn set_mouse_profile(&self, name: Option<&str>) -> Result<()> {
        let bundle = self.shared.prepare_slot(name, DeviceType::Mouse)?;
        *self.shared.mouse_bundle.write() = bundle;
        self.shared.current_profiles.write().mouse = name.map(str::to_string);
        Ok(())
    }

    /// Persists a new default pair. When the engine is currently on the
    /// defaults the change applies immediately; otherwise it takes effect
    /// at the next focus switch.
    pub fn set_default_profiles(&self, profiles: Profiles) -> Result<()> {
        self.shared.rules.set_default_profiles(profiles.clone())?;

        let on_defaults = self.shared.current_profiles.read().is_default;
        if on_defaults {
            let mut pair = profiles;
            pair.is_default = true;
            self.shared.update_profiles(pair);
        }
        Ok(())
    }

    /// The (keyboard, mouse) pair currently in use.
    pub fn current_profiles(&self) -> Profiles {
        self.shared.current_profiles.read().clone()
    }

    // ------------------------------------------------------------------
    // Effects, volume, modifiers
    // ------------------------------------------------------------------

    pub fn keyboard_effects(&self) -> &DeviceEffects {
        &self.shared.keyboard_effects
    }

    pub fn mouse_effects(&self) -> &DeviceEffects {
        &self.shared.mouse_effects
    }

    pub fn volumes(&self) -> &VolumeControl {
        &self.shared.volumes
    }

    pub fn modifier_keys(&self) -> &ModifierSet {
        &self.shared.modifiers
    }

    // ------------------------------------------------------------------
    // Hotkeys
    // ------------------------------------------------------------------

    pub fn hotkey_groups(&self) -> Vec<HotkeyGroup> {
        self.shared.hotkeys.groups()
    }

    /// Replaces the hotkey groups and persists them to `hotkeys.yaml`.
    pub fn set_hotkey_groups(&self, groups: Vec<HotkeyGroup>) -> Result<()> {
        hotkeys::save_groups(&self.root, &groups)?;
        self.shared.hotkeys.set_groups(groups);
        Ok(())
    }

    // ------------------------------------------------------------------
    // On-screen-keys helper
    // ------------------------------------------------------------------

    pub fn set_osk_enabled(&self, enabled: bool) {
        *self.shared.osk.enabled.write() = enabled;
    }

    pub fn osk_enabled(&self) -> bool {
        *self.shared.osk.enabled.read()
    }

    pub fn set_osk_config(&self, config: OverlayConfig) {
        *self.shared.osk.config.write() = config;
    }

    pub fn osk_config(&self) -> OverlayConfig {
        self.shared.osk.config.read().clone()
    }
}

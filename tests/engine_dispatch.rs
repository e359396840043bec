//! End-to-end dispatch tests
//!
//! Drive the engine through injected listeners and observe playback
//! through a recording player stub. Audio fixtures are real WAV files with
//! distinct lengths so each play can be attributed to its source.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thock::audio::effects::EffectsConfig;
use thock::audio::mixer::AudioPlayer;
use thock::audio::AudioBuffer;
use thock::engine::{Engine, EngineConfig, PanMode};
use thock::error::AudioError;
use thock::focus::{ChannelFocusSource, FocusEvent};
use thock::input::{Action, ChannelKeyboardListener, KeyEvent};
use thock::key;
use thock::rules::{Profiles, Rule};
use tokio::sync::mpsc;

/// Frame counts used to tell fixtures apart after decoding.
const PRESS_FRAMES: u32 = 441;
const RELEASE_FRAMES: u32 = 882;
const ALT_PRESS_FRAMES: u32 = 1323;

#[derive(Clone)]
struct RecordingPlayer {
    plays: Arc<Mutex<Vec<(usize, EffectsConfig)>>>,
}

impl RecordingPlayer {
    fn new() -> Self {
        Self {
            plays: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn plays(&self) -> Vec<(usize, EffectsConfig)> {
        self.plays.lock().clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<(usize, EffectsConfig)> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let plays = self.plays();
            if plays.len() >= count {
                return plays;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {count} plays, saw {}",
                plays.len()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Waits a settle period and asserts no more than `count` plays landed.
    async fn assert_settled_at(&self, count: usize) {
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(self.plays().len(), count);
    }
}

impl AudioPlayer for RecordingPlayer {
    fn play(&self, buffer: Arc<AudioBuffer>, effects: EffectsConfig) -> Result<(), AudioError> {
        self.plays.lock().push((buffer.frames(), effects));
        Ok(())
    }
}

fn write_wav(path: &Path, frames: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / 44_100.0;
        let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        writer.write_sample((sample * 12000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Writes a keyboard profile with one press/release source.
fn write_keyboard_profile(root: &Path, dir: &str, name: &str) {
    let profile_dir = root.join("profiles").join(dir);
    std::fs::create_dir_all(&profile_dir).unwrap();
    write_wav(&profile_dir.join("press.wav"), PRESS_FRAMES);
    write_wav(&profile_dir.join("release.wav"), RELEASE_FRAMES);
    std::fs::write(
        profile_dir.join("profile.yaml"),
        format!(
            "profile:\n  name: {name}\n  device: keyboard\nsources:\n  - id: s1\n    source:\n      press: press.wav\n      release: release.wav\nkeys:\n  default: [s1]\n"
        ),
    )
    .unwrap();
}

/// Writes a keyboard profile with two press-only sources in the default pool.
fn write_two_source_profile(root: &Path, dir: &str, name: &str) {
    let profile_dir = root.join("profiles").join(dir);
    std::fs::create_dir_all(&profile_dir).unwrap();
    write_wav(&profile_dir.join("a.wav"), PRESS_FRAMES);
    write_wav(&profile_dir.join("b.wav"), ALT_PRESS_FRAMES);
    std::fs::write(
        profile_dir.join("profile.yaml"),
        format!(
            "profile:\n  name: {name}\n  device: keyboard\nsources:\n  - id: s1\n    source: a.wav\n  - id: s2\n    source: b.wav\nkeys:\n  default: [s1, s2]\n"
        ),
    )
    .unwrap();
}

fn write_mouse_profile(root: &Path, dir: &str, name: &str) {
    let profile_dir = root.join("profiles").join(dir);
    std::fs::create_dir_all(&profile_dir).unwrap();
    write_wav(&profile_dir.join("click.wav"), PRESS_FRAMES);
    std::fs::write(
        profile_dir.join("profile.yaml"),
        format!(
            "profile:\n  name: {name}\n  device: mouse\nsources:\n  - id: s1\n    source: click.wav\nbuttons:\n  default: s1\n"
        ),
    )
    .unwrap();
}

struct Rig {
    engine: Engine,
    key_tx: mpsc::Sender<KeyEvent>,
    focus_tx: mpsc::Sender<FocusEvent>,
    player: RecordingPlayer,
}

fn build_rig(root: &Path) -> Rig {
    let (keyboard_listener, key_tx) = ChannelKeyboardListener::new();
    let (focus_source, focus_tx) = ChannelFocusSource::new(16);
    let player = RecordingPlayer::new();

    let mut config = EngineConfig::new(root);
    config.keyboard_listener = Some(Box::new(keyboard_listener));
    config.mouse_listener = None;
    config.focus_source = Some(Box::new(focus_source));
    config.player = Some(Box::new(player.clone()));

    Rig {
        engine: Engine::new(config).unwrap(),
        key_tx,
        focus_tx,
        player,
    }
}

fn key_event(k: key::Key, action: Action) -> KeyEvent {
    KeyEvent {
        device: Arc::from("test-keyboard"),
        key: k,
        action,
        timestamp: Instant::now(),
    }
}

#[tokio::test]
async fn test_basic_press_release_plays_both_sounds() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine.enable().await.unwrap();

    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    let plays = rig.player.wait_for(1).await;
    assert_eq!(plays[0].0 as u32, PRESS_FRAMES);

    rig.key_tx
        .send(key_event(key::A, Action::Release))
        .await
        .unwrap();
    let plays = rig.player.wait_for(2).await;
    assert_eq!(plays[1].0 as u32, RELEASE_FRAMES);

    rig.player.assert_settled_at(2).await;
    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_autorepeat_press_is_ignored() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine.enable().await.unwrap();

    // Held key: the second press is autorepeat and must not re-trigger.
    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    rig.key_tx
        .send(key_event(key::A, Action::Release))
        .await
        .unwrap();

    let plays = rig.player.wait_for(2).await;
    let press_count = plays.iter().filter(|(f, _)| *f as u32 == PRESS_FRAMES).count();
    let release_count = plays
        .iter()
        .filter(|(f, _)| *f as u32 == RELEASE_FRAMES)
        .count();
    assert_eq!(press_count, 1);
    assert_eq!(release_count, 1);

    rig.player.assert_settled_at(2).await;
    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_default_pool_selection_is_roughly_uniform() {
    let root = tempfile::tempdir().unwrap();
    write_two_source_profile(root.path(), "p1", "Duo");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Duo")).unwrap();
    rig.engine.enable().await.unwrap();

    for _ in 0..1000 {
        rig.key_tx
            .send(key_event(key::A, Action::Press))
            .await
            .unwrap();
        // Release resolves to silence (press-only sources) but clears the
        // held state for the next press.
        rig.key_tx
            .send(key_event(key::A, Action::Release))
            .await
            .unwrap();
    }

    let plays = rig.player.wait_for(1000).await;
    let first = plays
        .iter()
        .filter(|(f, _)| *f as u32 == PRESS_FRAMES)
        .count();
    let second = plays
        .iter()
        .filter(|(f, _)| *f as u32 == ALT_PRESS_FRAMES)
        .count();
    assert_eq!(first + second, 1000);
    assert!(
        (450..=550).contains(&first),
        "selection skewed: {first}/{second}"
    );

    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_hotkey_mute_fires_once_on_release() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine.enable().await.unwrap();

    // Default hotkeys bind Ctrl+Shift+Alt+M to mute-all.
    for k in [key::LEFT_CONTROL, key::LEFT_SHIFT, key::LEFT_ALT, key::M] {
        rig.key_tx.send(key_event(k, Action::Press)).await.unwrap();
    }
    assert_eq!(rig.engine.volumes().keyboard_volume(), 1.0);

    rig.key_tx
        .send(key_event(key::M, Action::Release))
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while rig.engine.volumes().keyboard_volume() != 0.0 {
        assert!(Instant::now() < deadline, "mute hotkey never fired");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(rig.engine.volumes().mouse_volume(), 0.0);

    // Releasing the modifiers afterwards must not fire anything else.
    for k in [key::LEFT_ALT, key::LEFT_SHIFT, key::LEFT_CONTROL] {
        rig.key_tx
            .send(key_event(k, Action::Release))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rig.engine.volumes().keyboard_volume(), 0.0);

    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_positional_pan_values() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine
        .keyboard_effects()
        .set_pan(true, PanMode::KeyPosition, 18);
    rig.engine.enable().await.unwrap();

    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    let plays = rig.player.wait_for(1).await;
    let pan = plays[0].1.pan.as_ref().expect("pan should be set").pan;
    assert!((pan - (2.0 * 2.0 / 18.0 - 1.0)).abs() < 1e-9, "A pan: {pan}");

    rig.key_tx
        .send(key_event(key::A, Action::Release))
        .await
        .unwrap();
    rig.player.wait_for(2).await;

    rig.key_tx
        .send(key_event(key::ENTER, Action::Press))
        .await
        .unwrap();
    let plays = rig.player.wait_for(3).await;
    let pan = plays[2].1.pan.as_ref().expect("pan should be set").pan;
    assert!(
        (pan - (2.0 * 13.0 / 18.0 - 1.0)).abs() < 1e-9,
        "Enter pan: {pan}"
    );

    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_focus_switch_with_invalid_profile_rolls_back() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "KbOne");
    write_mouse_profile(root.path(), "m1", "MsOne");
    write_mouse_profile(root.path(), "m2", "MsTwo");

    let rig = build_rig(root.path());
    rig.engine
        .set_default_profiles(Profiles {
            keyboard: Some("KbOne".to_string()),
            mouse: Some("MsOne".to_string()),
            is_default: true,
        })
        .unwrap();
    rig.engine
        .rules()
        .upsert(Rule {
            app_path: "*game*".to_string(),
            profiles: Profiles {
                keyboard: Some("does-not-exist".to_string()),
                mouse: Some("MsTwo".to_string()),
                is_default: false,
            },
            enabled: true,
        })
        .unwrap();
    rig.engine.enable().await.unwrap();

    rig.focus_tx
        .send(FocusEvent {
            executable: "/usr/bin/some-game".to_string(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The whole change is dropped: neither slot moved.
    let current = rig.engine.current_profiles();
    assert_eq!(current.keyboard.as_deref(), Some("KbOne"));
    assert_eq!(current.mouse.as_deref(), Some("MsOne"));

    // Keyboard events still play the original profile.
    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    let plays = rig.player.wait_for(1).await;
    assert_eq!(plays[0].0 as u32, PRESS_FRAMES);

    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_focus_switch_to_valid_profiles_applies() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "KbOne");
    write_two_source_profile(root.path(), "p2", "KbTwo");

    let rig = build_rig(root.path());
    rig.engine
        .set_default_profiles(Profiles {
            keyboard: Some("KbOne".to_string()),
            mouse: None,
            is_default: true,
        })
        .unwrap();
    rig.engine
        .rules()
        .upsert(Rule {
            app_path: "*editor*".to_string(),
            profiles: Profiles {
                keyboard: Some("KbTwo".to_string()),
                mouse: None,
                is_default: false,
            },
            enabled: true,
        })
        .unwrap();
    rig.engine.enable().await.unwrap();

    rig.focus_tx
        .send(FocusEvent {
            executable: "/usr/bin/editor".to_string(),
        })
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while rig.engine.current_profiles().keyboard.as_deref() != Some("KbTwo") {
        assert!(Instant::now() < deadline, "profile switch never applied");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    rig.engine.disable().await.unwrap();
}

#[tokio::test]
async fn test_no_audio_after_disable() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine.enable().await.unwrap();

    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    rig.player.wait_for(1).await;

    rig.engine.disable().await.unwrap();

    // Events sent after disable must not produce playback.
    let _ = rig
        .key_tx
        .send(key_event(key::B, Action::Press))
        .await;
    rig.player.assert_settled_at(1).await;
}

#[tokio::test]
async fn test_muted_keyboard_snapshots_zero_volume() {
    let root = tempfile::tempdir().unwrap();
    write_keyboard_profile(root.path(), "p1", "Clicky");

    let rig = build_rig(root.path());
    rig.engine.set_keyboard_profile(Some("Clicky")).unwrap();
    rig.engine.volumes().mute_keyboard();
    rig.engine.enable().await.unwrap();

    rig.key_tx
        .send(key_event(key::A, Action::Press))
        .await
        .unwrap();
    let plays = rig.player.wait_for(1).await;

    // The playback is scheduled with the muted (zero) volume snapshot.
    assert_eq!(plays[0].1.volume.as_ref().unwrap().volume, 0.0);

    rig.engine.disable().await.unwrap();
}

//! Hotkey matching and dispatch
//!
//! Matching is triggered only on key release. The keys still held are
//! filtered down to those that appear as a modifier in any group; the first
//! group whose modifier set equals that filtered set exactly is searched
//! for a binding on the released key. Handlers run inline; delegates run on
//! their own threads after handler dispatch so UI refreshes never delay the
//! dispatcher.

use super::{DeviceAction, HotkeyAction, HotkeyGroup, HotkeyTarget};
use crate::error::HotkeyError;
use crate::input::{Action, KeyEvent};
use crate::key::Key;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler invoked when a binding fires; receives the matched binding's
/// action so it can pull the configured value.
pub type Handler = Arc<dyn Fn(&DeviceAction) -> Result<(), HotkeyError> + Send + Sync>;

/// Called after a binding fires, off the dispatch path.
pub type Delegate = Arc<dyn Fn(HotkeyFired) + Send + Sync>;

/// A fired hotkey, as reported to delegates.
#[derive(Debug, Clone)]
pub struct HotkeyFired {
    pub modifiers: Vec<String>,
    pub key: String,
    pub action: DeviceAction,
}

/// Registry of action handlers, keyed by (target, action). Owned by the
/// engine and injected at construction.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<(HotkeyTarget, HotkeyAction), Handler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, target: HotkeyTarget, action: HotkeyAction, handler: F)
    where
        F: Fn(&DeviceAction) -> Result<(), HotkeyError> + Send + Sync + 'static,
    {
        self.handlers.insert((target, action), Arc::new(handler));
    }

    fn get(&self, target: HotkeyTarget, action: HotkeyAction) -> Option<&Handler> {
        self.handlers.get(&(target, action))
    }
}

/// Matches key releases against the configured groups and dispatches.
pub struct HotkeyMatcher {
    groups: RwLock<Vec<HotkeyGroup>>,
    registry: ActionRegistry,
    delegates: Vec<Delegate>,
}

impl HotkeyMatcher {
    pub fn new(
        groups: Vec<HotkeyGroup>,
        registry: ActionRegistry,
        delegates: Vec<Delegate>,
    ) -> Self {
        Self {
            groups: RwLock::new(groups),
            registry,
            delegates,
        }
    }

    pub fn groups(&self) -> Vec<HotkeyGroup> {
        self.groups.read().clone()
    }

    pub fn set_groups(&self, groups: Vec<HotkeyGroup>) {
        *self.groups.write() = groups;
    }

    /// Matches a released key against the groups given the keys currently
    /// held (the released key already removed). Returns the fired binding,
    /// or `None` for a plain keystroke.
    pub fn execute(
        &self,
        event: &KeyEvent,
        keys_down: &[Key],
    ) -> Result<Option<HotkeyFired>, HotkeyError> {
        if event.action != Action::Release {
            return Ok(None);
        }

        // Snapshot so concurrent set_groups can't shift matching mid-event.
        let groups = self.groups.read().clone();

        let modifiers_down: Vec<Key> = keys_down
            .iter()
            .copied()
            .filter(|k| {
                groups
                    .iter()
                    .any(|group| modifier_list_contains(&group.modifiers, k))
            })
            .collect();

        let mut fired: Option<HotkeyFired> = None;
        'groups: for group in &groups {
            if group.modifiers.len() != modifiers_down.len() {
                continue;
            }
            if !modifiers_down
                .iter()
                .all(|k| modifier_list_contains(&group.modifiers, k))
            {
                continue;
            }

            for binding in &group.keys {
                if binding.key.eq_ignore_ascii_case(event.key.name) {
                    fired = Some(HotkeyFired {
                        modifiers: group.modifiers.clone(),
                        key: binding.key.clone(),
                        action: binding.action.clone(),
                    });
                    break 'groups;
                }
            }
        }

        let Some(fired) = fired else {
            return Ok(None);
        };

        let handler = self
            .registry
            .get(fired.action.device, fired.action.action)
            .ok_or_else(|| HotkeyError::HandlerNotFound {
                action: fired.action.action.as_str().to_string(),
                target: fired.action.device.as_str().to_string(),
            })?;
        handler(&fired.action)?;

        for delegate in &self.delegates {
            let delegate = delegate.clone();
            let event = fired.clone();
            std::thread::spawn(move || delegate(event));
        }

        Ok(Some(fired))
    }
}

/// A key counts as a listed modifier when its name matches
/// case-insensitively or its code appears as a decimal string.
fn modifier_list_contains(modifiers: &[String], key: &Key) -> bool {
    let code = key.code.to_string();
    modifiers
        .iter()
        .any(|m| m.eq_ignore_ascii_case(key.name) || *m == code)
}

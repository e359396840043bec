//! Application rules
//!
//! Maps a foreground executable path (glob) to the (keyboard, mouse)
//! profile pair to use, with a default pair when nothing matches. The whole
//! document persists as one `rules.json`; every mutation writes a temp file
//! and renames it into place so a crash can never leave a torn file.

use crate::error::RulesError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RULES_FILE: &str = "rules.json";

/// A (keyboard, mouse) profile name pair. `None` disables sound for that
/// device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profiles {
    pub keyboard: Option<String>,
    pub mouse: Option<String>,
    /// Whether this pair is the default pair (not a rule's). Not serialized.
    #[serde(skip)]
    pub is_default: bool,
}

/// Which slots differ between two profile pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilesDiff {
    pub keyboard: bool,
    pub mouse: bool,
}

impl ProfilesDiff {
    pub fn any(&self) -> bool {
        self.keyboard || self.mouse
    }
}

impl Profiles {
    /// Compares against `new`, slot by slot.
    pub fn diff(&self, new: &Profiles) -> ProfilesDiff {
        ProfilesDiff {
            keyboard: self.keyboard != new.keyboard,
            mouse: self.mouse != new.mouse,
        }
    }
}

/// One glob-matched rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    /// Glob pattern matched against the executable path.
    pub app_path: String,
    pub profiles: Profiles,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct RulesDoc {
    default: Profiles,
    rules: Vec<Rule>,
}

/// Returns whether the pattern parses as a glob.
pub fn is_valid_glob_pattern(pattern: &str) -> bool {
    glob::Pattern::new(pattern).is_ok()
}

/// The persisted rule set.
pub struct RuleStore {
    path: PathBuf,
    doc: RwLock<RulesDoc>,
}

impl RuleStore {
    /// Loads `<dir>/rules.json`, creating it with empty defaults if absent.
    pub fn load(dir: &Path) -> Result<Self, RulesError> {
        let path = dir.join(RULES_FILE);

        let doc = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let mut doc: RulesDoc =
                serde_json::from_str(&contents).map_err(|e| RulesError::Parse(e.to_string()))?;
            doc.default.is_default = true;
            doc
        } else {
            let doc = RulesDoc {
                default: Profiles {
                    is_default: true,
                    ..Default::default()
                },
                rules: Vec::new(),
            };
            persist(&path, &doc)?;
            doc
        };

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// The default (keyboard, mouse) pair.
    pub fn default_profiles(&self) -> Profiles {
        let mut profiles = self.doc.read().default.clone();
        profiles.is_default = true;
        profiles
    }

    /// Replaces the default pair and persists.
    pub fn set_default_profiles(&self, mut profiles: Profiles) -> Result<(), RulesError> {
        profiles.is_default = true;
        let mut doc = self.doc.write();
        doc.default = profiles;
        persist(&self.path, &doc)
    }

    /// The profile pair for an executable path: the first matching enabled
    /// rule's pair, else the default.
    pub fn profiles_for_path(&self, app_path: &str) -> Profiles {
        let doc = self.doc.read();
        for rule in doc.rules.iter().filter(|r| r.enabled) {
            let matched = glob::Pattern::new(&rule.app_path)
                .map(|p| p.matches(app_path))
                .unwrap_or(false);
            if matched {
                let mut profiles = rule.profiles.clone();
                profiles.is_default = false;
                return profiles;
            }
        }
        let mut profiles = doc.default.clone();
        profiles.is_default = true;
        profiles
    }

    /// Adds or replaces the rule for a given app path and persists.
    pub fn upsert(&self, rule: Rule) -> Result<(), RulesError> {
        if !is_valid_glob_pattern(&rule.app_path) {
            return Err(RulesError::InvalidPattern(rule.app_path));
        }
        let mut doc = self.doc.write();
        doc.rules.retain(|r| r.app_path != rule.app_path);
        doc.rules.push(rule);
        persist(&self.path, &doc)
    }

    /// Removes the rule for an app path and persists.
    pub fn remove(&self, app_path: &str) -> Result<(), RulesError> {
        let mut doc = self.doc.write();
        doc.rules.retain(|r| r.app_path != app_path);
        persist(&self.path, &doc)
    }

    pub fn list(&self) -> Vec<Rule> {
        self.doc.read().rules.clone()
    }
}

/// Serializes the document next to its destination and renames into place.
fn persist(path: &Path, doc: &RulesDoc) -> Result<(), RulesError> {
    let json =
        serde_json::to_string_pretty(doc).map_err(|e| RulesError::Parse(e.to_string()))?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(json.as_bytes())?;
    temp.persist(path).map_err(|e| RulesError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(keyboard: Option<&str>, mouse: Option<&str>) -> Profiles {
        Profiles {
            keyboard: keyboard.map(str::to_string),
            mouse: mouse.map(str::to_string),
            is_default: false,
        }
    }

    #[test]
    fn test_load_creates_file_with_empty_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        assert!(dir.path().join(RULES_FILE).exists());

        let defaults = store.default_profiles();
        assert!(defaults.is_default);
        assert_eq!(defaults.keyboard, None);
        assert_eq!(defaults.mouse, None);
    }

    #[test]
    fn test_rules_match_by_glob() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        store.set_default_profiles(pair(Some("kb-default"), None)).unwrap();
        store
            .upsert(Rule {
                app_path: "*game*".to_string(),
                profiles: pair(Some("kb-game"), Some("ms-game")),
                enabled: true,
            })
            .unwrap();

        let matched = store.profiles_for_path("/usr/bin/some-game-x");
        assert_eq!(matched.keyboard.as_deref(), Some("kb-game"));
        assert!(!matched.is_default);

        let unmatched = store.profiles_for_path("/usr/bin/editor");
        assert_eq!(unmatched.keyboard.as_deref(), Some("kb-default"));
        assert!(unmatched.is_default);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        store
            .upsert(Rule {
                app_path: "*".to_string(),
                profiles: pair(Some("kb-any"), None),
                enabled: false,
            })
            .unwrap();

        let profiles = store.profiles_for_path("/bin/anything");
        assert!(profiles.is_default);
    }

    #[test]
    fn test_upsert_replaces_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        for name in ["first", "second"] {
            store
                .upsert(Rule {
                    app_path: "*app*".to_string(),
                    profiles: pair(Some(name), None),
                    enabled: true,
                })
                .unwrap();
        }
        assert_eq!(store.list().len(), 1);
        assert_eq!(
            store.profiles_for_path("my-app").keyboard.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        assert!(matches!(
            store.upsert(Rule {
                app_path: "[unclosed".to_string(),
                profiles: pair(None, None),
                enabled: true,
            }),
            Err(RulesError::InvalidPattern(_))
        ));
        assert!(!is_valid_glob_pattern("[unclosed"));
        assert!(is_valid_glob_pattern("*ok*"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RuleStore::load(dir.path()).unwrap();
            store
                .set_default_profiles(pair(Some("kb"), Some("ms")))
                .unwrap();
            store
                .upsert(Rule {
                    app_path: "*term*".to_string(),
                    profiles: pair(None, None),
                    enabled: true,
                })
                .unwrap();
        }

        let reloaded = RuleStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.default_profiles().keyboard.as_deref(), Some("kb"));
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn test_diff_transitions() {
        let a = pair(Some("k1"), None);
        let b = pair(Some("k1"), None);
        assert!(!a.diff(&b).any());

        let c = pair(Some("k2"), None);
        assert!(a.diff(&c).keyboard);
        assert!(!a.diff(&c).mouse);

        let d = pair(None, Some("m1"));
        let diff = a.diff(&d);
        assert!(diff.keyboard && diff.mouse);
    }
}

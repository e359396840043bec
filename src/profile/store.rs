//! Profile directory store
//!
//! Every subdirectory of the profiles root holding a `profile.yaml` is a
//! profile; the other files in the directory are its audio assets.
//! Malformed directories are logged and skipped so one broken profile never
//! takes the library down.

use super::{DeviceType, Profile};
use crate::error::ProfileError;
use parking_lot::RwLock;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PROFILE_FILE: &str = "profile.yaml";

pub struct ProfileStore {
    dir: PathBuf,
    profiles: RwLock<Vec<Arc<Profile>>>,
}

impl ProfileStore {
    /// Opens (creating if needed) the profiles root and loads everything in it.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            profiles: RwLock::new(Vec::new()),
        };
        store.reload()?;
        Ok(store)
    }

    /// Rescans the profiles root, replacing the in-memory list.
    pub fn reload(&self) -> Result<(), ProfileError> {
        let mut loaded = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let location = entry.path();

            match load_profile_dir(&location) {
                Ok(profile) => loaded.push(Arc::new(profile)),
                Err(e) => {
                    tracing::error!(path = %location.display(), error = %e, "skipping profile");
                }
            }
        }

        *self.profiles.write() = loaded;
        Ok(())
    }

    /// All loaded profiles.
    pub fn all(&self) -> Vec<Arc<Profile>> {
        self.profiles.read().clone()
    }

    pub fn keyboard_profiles(&self) -> Vec<Arc<Profile>> {
        self.by_device(DeviceType::Keyboard)
    }

    pub fn mouse_profiles(&self) -> Vec<Arc<Profile>> {
        self.by_device(DeviceType::Mouse)
    }

    fn by_device(&self, device: DeviceType) -> Vec<Arc<Profile>> {
        self.profiles
            .read()
            .iter()
            .filter(|p| p.details.device_type == device)
            .cloned()
            .collect()
    }

    /// Finds a profile by name, case-insensitively, first-found wins.
    pub fn find(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles
            .read()
            .iter()
            .find(|p| p.details.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Deletes a profile's directory and drops it from the list.
    pub fn delete(&self, name: &str) -> Result<(), ProfileError> {
        let profile = self
            .find(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        std::fs::remove_dir_all(&profile.location)?;
        self.profiles
            .write()
            .retain(|p| !p.details.name.eq_ignore_ascii_case(name));
        Ok(())
    }

    /// Exports a profile directory as a zip archive. `dest` may be a `.zip`
    /// path or a directory (the archive is then named after the profile).
    pub fn export(&self, name: &str, dest: &Path) -> Result<PathBuf, ProfileError> {
        let profile = self
            .find(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        let zip_path = if dest.extension().is_some_and(|e| e == "zip") {
            dest.to_path_buf()
        } else {
            dest.join(format!("{}.zip", profile.details.name))
        };

        let file = File::create(&zip_path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        add_dir_to_zip(&mut writer, &profile.location, &profile.location, options)?;
        writer
            .finish()
            .map_err(|e| ProfileError::Archive(e.to_string()))?;

        Ok(zip_path)
    }

    /// Imports a profile from a zip archive: extract to a temp directory
    /// inside the profiles root (so the final rename stays on one
    /// filesystem), validate, then atomically rename into place.
    pub fn import(&self, zip_path: &Path) -> Result<(), ProfileError> {
        let file = File::open(zip_path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| ProfileError::Archive(e.to_string()))?;

        let temp = tempfile::Builder::new()
            .prefix("profile-import-")
            .tempdir_in(&self.dir)?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ProfileError::Archive(e.to_string()))?;

            // ZipSlip guard: every resolved path must stay under the root.
            let relative = entry
                .enclosed_name()
                .map(Path::to_path_buf)
                .ok_or_else(|| ProfileError::PathTraversal(entry.name().to_string()))?;
            let out_path = temp.path().join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
        }

        let profile = load_profile_dir(temp.path())?;
        if self.find(&profile.details.name).is_some() {
            return Err(ProfileError::NameCollision(profile.details.name));
        }

        let target = self.dir.join(uuid::Uuid::new_v4().to_string());
        std::fs::rename(temp.into_path(), target)?;

        self.reload()
    }
}

/// Loads and validates one profile directory.
fn load_profile_dir(location: &Path) -> Result<Profile, ProfileError> {
    let metadata_path = location.join(PROFILE_FILE);
    let metadata = std::fs::read_to_string(&metadata_path)?;

    let mut profile: Profile =
        serde_yaml::from_str(&metadata).map_err(|e| ProfileError::Parse {
            path: metadata_path,
            reason: e.to_string(),
        })?;
    profile.location = location.to_path_buf();
    profile.validate()?;
    Ok(profile)
}

fn add_dir_to_zip(
    writer: &mut zip::ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: zip::write::FileOptions,
) -> Result<(), ProfileError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            add_dir_to_zip(writer, root, &path, options)?;
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .expect("entry is under the walked root");
        writer
            .start_file(relative.to_string_lossy(), options)
            .map_err(|e| ProfileError::Archive(e.to_string()))?;
        let mut file = File::open(&path)?;
        io::copy(&mut file, writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_profile(root: &Path, dir_name: &str, profile_name: &str, device: &str) -> PathBuf {
        let dir = root.join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(PROFILE_FILE),
            format!(
                "profile:\n  name: {profile_name}\n  device: {device}\nsources:\n  - id: s1\n    source: click.wav\nkeys:\n  default: [s1]\n"
            ),
        )
        .unwrap();
        std::fs::write(dir.join("click.wav"), b"fake audio").unwrap();
        dir
    }

    #[test]
    fn test_load_and_find_case_insensitive() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "p1", "Cherry MX", "keyboard");
        write_profile(root.path(), "p2", "Quiet Mouse", "mouse");

        let store = ProfileStore::load(root.path()).unwrap();
        assert_eq!(store.all().len(), 2);
        assert_eq!(store.keyboard_profiles().len(), 1);
        assert_eq!(store.mouse_profiles().len(), 1);

        assert!(store.find("cherry mx").is_some());
        assert!(store.find("CHERRY MX").is_some());
        assert!(store.find("missing").is_none());
    }

    #[test]
    fn test_skips_broken_profiles() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "good", "Good", "keyboard");

        // Directory without profile.yaml
        std::fs::create_dir_all(root.path().join("empty")).unwrap();
        // Profile referencing a missing audio file
        let broken = root.path().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(
            broken.join(PROFILE_FILE),
            "profile:\n  name: Broken\nsources:\n  - id: s1\n    source: nope.wav\n",
        )
        .unwrap();

        let store = ProfileStore::load(root.path()).unwrap();
        assert_eq!(store.all().len(), 1);
        assert!(store.find("Good").is_some());
    }

    #[test]
    fn test_delete_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_profile(root.path(), "p1", "Doomed", "keyboard");

        let store = ProfileStore::load(root.path()).unwrap();
        store.delete("doomed").unwrap();
        assert!(!dir.exists());
        assert!(store.find("Doomed").is_none());

        assert!(matches!(
            store.delete("Doomed"),
            Err(ProfileError::NotFound(_))
        ));
    }

    #[test]
    fn test_export_import_round_trip() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "p1", "Travel", "keyboard");
        let store = ProfileStore::load(root.path()).unwrap();

        let out = tempfile::tempdir().unwrap();
        let zip_path = store.export("Travel", out.path()).unwrap();
        assert!(zip_path.exists());

        // Importing into a fresh root succeeds and preserves the assets.
        let other_root = tempfile::tempdir().unwrap();
        let other = ProfileStore::load(other_root.path()).unwrap();
        other.import(&zip_path).unwrap();

        let imported = other.find("Travel").unwrap();
        assert!(imported.location.join("click.wav").is_file());
    }

    #[test]
    fn test_import_rejects_name_collision() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "p1", "Clash", "keyboard");
        let store = ProfileStore::load(root.path()).unwrap();

        let out = tempfile::tempdir().unwrap();
        let zip_path = store.export("Clash", out.path()).unwrap();

        assert!(matches!(
            store.import(&zip_path),
            Err(ProfileError::NameCollision(_))
        ));
    }

    #[test]
    fn test_import_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("evil.zip");
        let file = File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("../escape.txt", zip::write::FileOptions::default())
            .unwrap();
        io::Write::write_all(&mut writer, b"gotcha").unwrap();
        writer.finish().unwrap();

        let root = tempfile::tempdir().unwrap();
        let store = ProfileStore::load(root.path()).unwrap();
        assert!(matches!(
            store.import(&zip_path),
            Err(ProfileError::PathTraversal(_))
        ));
        assert!(!root.path().join("..").join("escape.txt").exists());
    }
}

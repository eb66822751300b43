use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use toml::{Table, Value};
use tracing::{debug, info};

use crate::{ClockSettings, NetworkSettings, SceneSettings, Settings, SettingsError, SyncSettings};

/// Settings store backed by a single TOML file (thread-safe).
///
/// Sections that are absent from the file resolve to their `Default`.
/// Keys missing inside a present section are filled in by `#[serde(default)]`.
pub struct SettingsStore {
    file_path: PathBuf,
    document: RwLock<Table>,
}

impl SettingsStore {
    /// Opens the store. A missing or empty file yields an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let file_path = path.into();

        let document = if file_path.exists() {
            let content = fs::read_to_string(&file_path)?;
            if content.trim().is_empty() {
                Table::new()
            } else {
                content.parse::<Table>()?
            }
        } else {
            debug!(path = %file_path.display(), "settings file missing, using defaults");
            Table::new()
        };

        Ok(Self {
            file_path,
            document: RwLock::new(document),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Reads one section.
    pub fn get<T: Settings>(&self) -> Result<T, SettingsError> {
        let document = match self.document.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match document.get(T::SECTION) {
            None => Ok(T::default()),
            Some(Value::Table(table)) => Ok(table.clone().try_into::<T>()?),
            Some(_) => Err(SettingsError::InvalidSection(T::SECTION)),
        }
    }

    /// Replaces one section in memory. Call [`SettingsStore::save`] to persist.
    pub fn set<T: Settings>(&self, value: &T) -> Result<(), SettingsError> {
        let table = Table::try_from(value)?;
        let mut document = match self.document.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        document.insert(T::SECTION.to_string(), Value::Table(table));
        Ok(())
    }

    /// Loads every known section into one snapshot.
    pub fn snapshot(&self) -> Result<SyncSettings, SettingsError> {
        Ok(SyncSettings {
            network: self.get::<NetworkSettings>()?,
            clock: self.get::<ClockSettings>()?,
            scene: self.get::<SceneSettings>()?,
        })
    }

    /// Writes the document back, creating parent directories when needed.
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let text = {
            let document = match self.document.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            toml::to_string_pretty(&*document)?
        };

        fs::write(&self.file_path, text)?;
        info!(path = %self.file_path.display(), "settings saved");
        Ok(())
    }

    /// Convenience: open `path` and return the snapshot, or defaults when the file is absent.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Result<SyncSettings, SettingsError> {
        Self::open(path)?.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::load_or_default(dir.path().join("none.toml")).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.network.scene_port, 5555);
        assert_eq!(settings.clock.effective_sync_interval(), 60);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.toml");
        fs::write(&path, "[clock]\nframe_rate = 24\n").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        let clock = store.get::<ClockSettings>().unwrap();
        assert_eq!(clock.frame_rate, 24);
        assert_eq!(clock.sync_interval_ticks, 0);
        assert_eq!(store.get::<NetworkSettings>().unwrap(), NetworkSettings::default());
    }

    #[test]
    fn non_table_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.toml");
        fs::write(&path, "network = 3\n").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert!(matches!(
            store.get::<NetworkSettings>(),
            Err(SettingsError::InvalidSection("network"))
        ));
    }
}

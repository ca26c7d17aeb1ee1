//! User settings and the store that owns them.
//!
//! Settings are persisted as JSON when the store was opened from a path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A single named toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Setting {
    Sound,
    Speech,
    Ram32k,
    F18a,
    Flicker,
    PcKeyboard,
    MapArrowKeys,
    GoogleDrive,
    Ams,
    Gram,
    Pixelated,
    PauseOnFocusLost,
}

impl Setting {
    pub const ALL: [Setting; 12] = [
        Setting::Sound,
        Setting::Speech,
        Setting::Ram32k,
        Setting::F18a,
        Setting::Flicker,
        Setting::PcKeyboard,
        Setting::MapArrowKeys,
        Setting::GoogleDrive,
        Setting::Ams,
        Setting::Gram,
        Setting::Pixelated,
        Setting::PauseOnFocusLost,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Setting::Sound => "sound",
            Setting::Speech => "speech",
            Setting::Ram32k => "32kRam",
            Setting::F18a => "f18a",
            Setting::Flicker => "flicker",
            Setting::PcKeyboard => "pcKeyboard",
            Setting::MapArrowKeys => "mapArrowKeys",
            Setting::GoogleDrive => "googleDrive",
            Setting::Ams => "ams",
            Setting::Gram => "gram",
            Setting::Pixelated => "pixelated",
            Setting::PauseOnFocusLost => "pauseOnFocusLost",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Setting {
    type Err = CoreError;

    /// Case-insensitive; `-` and `_` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Setting::ALL
            .into_iter()
            .find(|setting| setting.name().to_lowercase() == wanted)
            .ok_or_else(|| CoreError::NotFound(format!("setting {s}")))
    }
}

/// Flat bag of toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub sound_enabled: bool,
    pub speech_enabled: bool,
    #[serde(rename = "32KRAMEnabled")]
    pub ram_32k_enabled: bool,
    #[serde(rename = "F18AEnabled")]
    pub f18a_enabled: bool,
    pub flicker_enabled: bool,
    pub pc_keyboard_enabled: bool,
    pub map_arrow_keys_enabled: bool,
    pub google_drive_enabled: bool,
    #[serde(rename = "AMSEnabled")]
    pub ams_enabled: bool,
    #[serde(rename = "GRAMEnabled")]
    pub gram_enabled: bool,
    pub pixelated_enabled: bool,
    pub pause_on_focus_lost_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            speech_enabled: true,
            ram_32k_enabled: true,
            f18a_enabled: false,
            flicker_enabled: true,
            pc_keyboard_enabled: true,
            map_arrow_keys_enabled: false,
            google_drive_enabled: false,
            ams_enabled: true,
            gram_enabled: false,
            pixelated_enabled: false,
            pause_on_focus_lost_enabled: false,
        }
    }
}

impl Settings {
    pub fn get(&self, setting: Setting) -> bool {
        match setting {
            Setting::Sound => self.sound_enabled,
            Setting::Speech => self.speech_enabled,
            Setting::Ram32k => self.ram_32k_enabled,
            Setting::F18a => self.f18a_enabled,
            Setting::Flicker => self.flicker_enabled,
            Setting::PcKeyboard => self.pc_keyboard_enabled,
            Setting::MapArrowKeys => self.map_arrow_keys_enabled,
            Setting::GoogleDrive => self.google_drive_enabled,
            Setting::Ams => self.ams_enabled,
            Setting::Gram => self.gram_enabled,
            Setting::Pixelated => self.pixelated_enabled,
            Setting::PauseOnFocusLost => self.pause_on_focus_lost_enabled,
        }
    }

    pub fn set(&mut self, setting: Setting, value: bool) {
        let field = match setting {
            Setting::Sound => &mut self.sound_enabled,
            Setting::Speech => &mut self.speech_enabled,
            Setting::Ram32k => &mut self.ram_32k_enabled,
            Setting::F18a => &mut self.f18a_enabled,
            Setting::Flicker => &mut self.flicker_enabled,
            Setting::PcKeyboard => &mut self.pc_keyboard_enabled,
            Setting::MapArrowKeys => &mut self.map_arrow_keys_enabled,
            Setting::GoogleDrive => &mut self.google_drive_enabled,
            Setting::Ams => &mut self.ams_enabled,
            Setting::Gram => &mut self.gram_enabled,
            Setting::Pixelated => &mut self.pixelated_enabled,
            Setting::PauseOnFocusLost => &mut self.pause_on_focus_lost_enabled,
        };
        *field = value;
    }

    /// Settings whose value differs between `self` and `other`, with the
    /// value from `other`.
    pub fn changes_to(&self, other: &Settings) -> Vec<(Setting, bool)> {
        Setting::ALL
            .into_iter()
            .filter(|s| self.get(*s) != other.get(*s))
            .map(|s| (s, other.get(s)))
            .collect()
    }
}

/// Owner of the live settings.
///
/// Clone is cheap (just clones the Arc); all clones share one value.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    current: Arc<RwLock<Settings>>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Create an unpersisted store.
    pub fn new(settings: Settings) -> Self {
        Self {
            current: Arc::new(RwLock::new(settings)),
            path: None,
        }
    }

    /// Open a store persisted at `path`. A missing file yields defaults.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            Settings::default()
        };
        Ok(Self {
            current: Arc::new(RwLock::new(settings)),
            path: Some(path),
        })
    }

    /// Copy of the live settings.
    pub fn get(&self) -> Settings {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_enabled(&self, setting: Setting) -> bool {
        self.get().get(setting)
    }

    pub fn is_sound_enabled(&self) -> bool {
        self.is_enabled(Setting::Sound)
    }

    pub fn is_f18a_enabled(&self) -> bool {
        self.is_enabled(Setting::F18a)
    }

    pub fn is_google_drive_enabled(&self) -> bool {
        self.is_enabled(Setting::GoogleDrive)
    }

    pub fn is_pixelated_enabled(&self) -> bool {
        self.is_enabled(Setting::Pixelated)
    }

    pub fn is_pause_on_focus_lost_enabled(&self) -> bool {
        self.is_enabled(Setting::PauseOnFocusLost)
    }

    /// Update one setting. Returns true if the value changed.
    ///
    /// The new value is written to disk before it becomes live, so a failed
    /// write leaves the store unchanged.
    pub fn set(&self, setting: Setting, value: bool) -> CoreResult<bool> {
        let mut current = self.current.write().map_err(|_| CoreError::LockPoisoned)?;
        if current.get(setting) == value {
            return Ok(false);
        }
        let mut next = current.clone();
        next.set(setting, value);
        self.write(&next)?;
        *current = next;
        Ok(true)
    }

    /// Replace every setting. Returns the settings that changed.
    ///
    /// Nothing changes in memory unless the write succeeds.
    pub fn restore_settings(&self, settings: Settings) -> CoreResult<Vec<(Setting, bool)>> {
        let mut current = self.current.write().map_err(|_| CoreError::LockPoisoned)?;
        let changes = current.changes_to(&settings);
        self.write(&settings)?;
        *current = settings;
        Ok(changes)
    }

    /// Write the settings to disk, if the store is persisted.
    pub fn save(&self) -> CoreResult<()> {
        self.write(&self.get())
    }

    fn write(&self, settings: &Settings) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_from_str() {
        assert_eq!("sound".parse::<Setting>().unwrap(), Setting::Sound);
        assert_eq!("F18A".parse::<Setting>().unwrap(), Setting::F18a);
        assert_eq!(
            "pause-on-focus-lost".parse::<Setting>().unwrap(),
            Setting::PauseOnFocusLost
        );
        assert_eq!("32k_ram".parse::<Setting>().unwrap(), Setting::Ram32k);
        assert!("turbo".parse::<Setting>().is_err());
    }

    #[test]
    fn test_get_set_every_setting() {
        let mut settings = Settings::default();
        for setting in Setting::ALL {
            settings.set(setting, true);
            assert!(settings.get(setting), "{setting} not set");
            settings.set(setting, false);
            assert!(!settings.get(setting), "{setting} not cleared");
        }
    }

    #[test]
    fn test_restore_reports_changes() {
        let store = SettingsStore::new(Settings::default());
        let mut next = Settings::default();
        next.f18a_enabled = true;
        next.sound_enabled = false;

        let changes = store.restore_settings(next.clone()).unwrap();
        assert_eq!(
            changes,
            vec![(Setting::Sound, false), (Setting::F18a, true)]
        );
        assert_eq!(store.get(), next);
    }

    #[test]
    fn test_set_reports_change_once() {
        let store = SettingsStore::default();
        assert!(store.set(Setting::Gram, true).unwrap());
        assert!(!store.set(Setting::Gram, true).unwrap());
        assert!(store.is_enabled(Setting::Gram));
    }

    #[test]
    fn test_persisted_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("ti99-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = std::fs::remove_file(&path);

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get(), Settings::default());
        store.set(Setting::Pixelated, true).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert!(reopened.is_pixelated_enabled());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_write_keeps_live_settings() {
        let dir = std::env::temp_dir().join(format!("ti99-settings-ro-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = std::fs::remove_dir_all(&dir);

        let store = SettingsStore::open(&path).unwrap();
        // A directory where the file should be makes every write fail
        std::fs::create_dir_all(&path).unwrap();

        let next = Settings {
            gram_enabled: true,
            ..Settings::default()
        };
        assert!(store.restore_settings(next).is_err());
        assert_eq!(store.get(), Settings::default());

        assert!(store.set(Setting::Pixelated, true).is_err());
        assert!(!store.is_pixelated_enabled());

        // Writing the value already held is not a change and touches nothing
        assert!(!store.set(Setting::Pixelated, false).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }
}

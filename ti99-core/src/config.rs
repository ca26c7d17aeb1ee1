//! Application configuration.
//!
//! Built once at startup and shared read-only. Stored as camelCase JSON;
//! unknown fields are ignored and missing fields get defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Key the machine snapshot is stored under.
pub const MACHINE_STATE_KEY: &str = "ti994a";

/// Cartridge loaded when no `cart` parameter is given.
pub const DEFAULT_CARTRIDGE: &str = "extended_basic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub title: String,
    pub version: String,
    pub date: String,
    /// Cartridge name loaded on READY unless a `cart` parameter overrides it.
    pub default_cartridge: String,
    pub machine_state_key: String,
    /// Delay between STARTED and the auto-run keystrokes.
    pub auto_run_delay_ms: u64,
    /// Keys typed to get past the title and selection menus.
    pub auto_run_keys: String,
    /// Root that module URLs are resolved against.
    pub asset_dir: PathBuf,
    /// Software menu JSON.
    pub catalog_file: PathBuf,
    /// Saved state and settings.
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "TI-99/4A".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            date: String::new(),
            default_cartridge: DEFAULT_CARTRIDGE.to_string(),
            machine_state_key: MACHINE_STATE_KEY.to_string(),
            auto_run_delay_ms: 2000,
            auto_run_keys: " 2".to_string(),
            asset_dir: PathBuf::from("assets"),
            catalog_file: PathBuf::from("assets/software/software.json"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn auto_run_delay(&self) -> Duration {
        Duration::from_millis(self.auto_run_delay_ms)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// "Welcome to <title> version <version>"
    pub fn banner(&self) -> String {
        format!("Welcome to {} version {}", self.title, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "title": "TI-99/4A", "autoRunDelayMs": 500, "extra": 1 }"#)
                .unwrap();
        assert_eq!(config.title, "TI-99/4A");
        assert_eq!(config.auto_run_delay(), Duration::from_millis(500));
        assert_eq!(config.machine_state_key, "ti994a");
        assert_eq!(config.default_cartridge, "extended_basic");
        assert_eq!(config.auto_run_keys, " 2");
    }

    #[test]
    fn test_paths_and_banner() {
        let config = AppConfig {
            title: "TI".to_string(),
            version: "9.1".to_string(),
            data_dir: PathBuf::from("/tmp/ti"),
            ..AppConfig::default()
        };
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/ti/settings.json"));
        assert_eq!(config.state_dir(), PathBuf::from("/tmp/ti/state"));
        assert_eq!(config.banner(), "Welcome to TI version 9.1");
    }
}

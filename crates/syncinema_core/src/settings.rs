//! Persistent App Settings
//!
//! Handles saving/loading session-wide settings to disk.
//!
//! # Storage Locations
//! - Linux: `~/.config/syncinema/settings.json`
//! - Windows: `%APPDATA%\syncinema\settings.json`
//! - macOS: `~/Library/Application Support/com.syncinema.syncinema/settings.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};

/// Session-wide settings that outlive a single track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub master_volume: f32,
    pub theme: String, // "dark", "light"
    pub sync_threshold_secs: f64,
}

fn default_sync_threshold() -> f64 {
    0.3
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            theme: "dark".to_string(),
            sync_threshold_secs: default_sync_threshold(),
        }
    }
}

impl AppSettings {
    /// Load settings from the platform config directory, or default if missing/corrupt
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No config directory available, using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit path, or default if missing/corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::File::open(path) {
                Ok(file) => match serde_json::from_reader(file) {
                    Ok(settings) => {
                        info!("Settings loaded from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        error!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    error!("Failed to open settings file: {}", e);
                }
            }
        }

        info!("Using default settings");
        Self::default()
    }

    /// Save settings to the platform config directory
    pub fn save(&self) -> EngineResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| EngineError::Storage("Could not determine config path".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Storage(e.to_string()))?;
        }

        let file = fs::File::create(path).map_err(|e| EngineError::Storage(e.to_string()))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| EngineError::Storage(e.to_string()))?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Platform-specific configuration directory shared by all persisted files
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "syncinema", "syncinema").map(|proj| proj.config_dir().to_path_buf())
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("syncinema-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.sync_threshold_secs, 0.3);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let settings = AppSettings {
            master_volume: 0.4,
            theme: "light".into(),
            sync_threshold_secs: 0.2,
        };
        settings.save_to(&path).unwrap();

        let loaded = AppSettings::load_from(&path);
        assert_eq!(loaded, settings);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppSettings::load_from(&path), AppSettings::default());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_backward_compat_missing_fields() {
        let old_json = r#"{ "masterVolume": 0.8, "theme": "dark" }"#;
        let settings: AppSettings = serde_json::from_str(old_json).unwrap();
        assert_eq!(settings.master_volume, 0.8);
        assert_eq!(settings.sync_threshold_secs, 0.3);
    }

    #[test]
    fn test_partial_file_keeps_present_fields() {
        let path = temp_path("partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "masterVolume": 0.4, "syncThresholdSecs": 0.25 }"#).unwrap();

        let loaded = AppSettings::load_from(&path);
        assert_eq!(loaded.master_volume, 0.4);
        assert_eq!(loaded.sync_threshold_secs, 0.25);
        assert_eq!(loaded.theme, "dark");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}

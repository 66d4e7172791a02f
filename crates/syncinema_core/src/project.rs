//! Project File Import/Export
//!
//! # Format
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "exportDate": "2026-10-16T18:30:00.000Z",
//!   "trackPrefs": { "<name>": { offset, playbackRate, deviceId, eq, useCompressor } },
//!   "appSettings": { "masterVolume": 1.0, "theme": "dark" }
//! }
//! ```
//!
//! Older files are the bare `trackPrefs` map with no envelope. They are
//! recognised by the absence of a `trackPrefs` key.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::track::{TrackPrefs, TrackPrefsPatch};

pub const PROJECT_VERSION: &str = "1.0";

/// Extension used for exported projects
pub const PROJECT_EXTENSION: &str = "sync";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAppSettings {
    pub master_volume: f32,
    pub theme: String,
}

/// An exported project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub version: String,
    pub export_date: String,
    pub track_prefs: BTreeMap<String, TrackPrefs>,
    pub app_settings: ProjectAppSettings,
}

impl ProjectFile {
    pub fn new(
        track_prefs: BTreeMap<String, TrackPrefs>,
        app_settings: ProjectAppSettings,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: PROJECT_VERSION.to_string(),
            export_date: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            track_prefs,
            app_settings,
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// App settings found in an imported file; each field is optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSettingsPatch {
    pub master_volume: Option<f32>,
    pub theme: Option<String>,
}

/// A parsed project, before it is applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedProject {
    pub track_prefs: BTreeMap<String, TrackPrefsPatch>,
    pub app_settings: Option<AppSettingsPatch>,
    /// Names whose entries could not be read
    pub skipped: Vec<String>,
}

/// Parse either project form
///
/// Fails only when the payload is not a JSON object (or the `trackPrefs`
/// member is not one). Individual unreadable entries are skipped.
pub fn parse_project(json: &str) -> EngineResult<ImportedProject> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(root) = value else {
        return Err(EngineError::InvalidProject("expected a JSON object".into()));
    };

    let (prefs, app_settings) = match root.get("trackPrefs") {
        Some(Value::Object(prefs)) => {
            let version = root.get("version").and_then(Value::as_str).unwrap_or("unknown");
            debug!("Project version {}", version);
            (prefs.clone(), root.get("appSettings").and_then(parse_app_settings))
        }
        Some(_) => {
            return Err(EngineError::InvalidProject("trackPrefs must be an object".into()));
        }
        None => {
            debug!("Legacy project without envelope");
            (root, None)
        }
    };

    let (track_prefs, skipped) = parse_entries(prefs);
    Ok(ImportedProject {
        track_prefs,
        app_settings,
        skipped,
    })
}

fn parse_entries(prefs: Map<String, Value>) -> (BTreeMap<String, TrackPrefsPatch>, Vec<String>) {
    let mut parsed = BTreeMap::new();
    let mut skipped = Vec::new();

    for (name, entry) in prefs {
        match serde_json::from_value::<TrackPrefsPatch>(entry) {
            Ok(patch) => {
                parsed.insert(name, patch);
            }
            Err(e) => {
                warn!("Skipping unreadable settings for '{}': {}", name, e);
                skipped.push(name);
            }
        }
    }

    (parsed, skipped)
}

fn parse_app_settings(value: &Value) -> Option<AppSettingsPatch> {
    let settings = value.as_object()?;
    Some(AppSettingsPatch {
        master_volume: settings
            .get("masterVolume")
            .and_then(Value::as_f64)
            .map(|v| v as f32),
        theme: settings
            .get("theme")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    })
}

/// Default download name, e.g. `syncinema_project_2026-10-16.sync`
pub fn suggested_file_name(date: DateTime<Utc>) -> String {
    format!(
        "syncinema_project_{}.{}",
        date.format("%Y-%m-%d"),
        PROJECT_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use syncinema_dsp::EqGains;

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 18, 30, 0).unwrap()
    }

    fn sample_project() -> ProjectFile {
        let mut prefs = BTreeMap::new();
        prefs.insert(
            "foo.mp3".to_string(),
            TrackPrefs {
                offset: 1.5,
                playback_rate: 1.02,
                device_id: "X".into(),
                eq: EqGains::new(3.0, 0.0, -2.0),
                use_compressor: true,
            },
        );
        ProjectFile::new(
            prefs,
            ProjectAppSettings {
                master_volume: 0.8,
                theme: "dark".into(),
            },
            exported_at(),
        )
    }

    #[test]
    fn test_export_envelope() {
        let json = sample_project().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["exportDate"], "2026-10-16T18:30:00.000Z");
        assert_eq!(value["trackPrefs"]["foo.mp3"]["playbackRate"], 1.02);
        assert_eq!(value["appSettings"]["theme"], "dark");
    }

    #[test]
    fn test_parse_envelope() {
        let json = sample_project().to_json().unwrap();
        let imported = parse_project(&json).unwrap();

        let patch = &imported.track_prefs["foo.mp3"];
        assert_eq!(patch.offset, Some(1.5));
        assert_eq!(patch.device_id.as_deref(), Some("X"));
        let app = imported.app_settings.unwrap();
        assert_eq!(app.master_volume, Some(0.8));
        assert_eq!(app.theme.as_deref(), Some("dark"));
    }

    #[test]
    fn test_parse_legacy_flat_map() {
        let json = r#"{ "en.mp3": { "offset": 0.25 }, "commentary.mp3": { "offset": -1.2, "useCompressor": true } }"#;
        let imported = parse_project(json).unwrap();

        assert_eq!(imported.track_prefs.len(), 2);
        assert!(imported.app_settings.is_none());
        assert_eq!(imported.track_prefs["commentary.mp3"].use_compressor, Some(true));
        assert_eq!(imported.track_prefs["en.mp3"].eq, None);
    }

    #[test]
    fn test_bad_entries_skipped() {
        let json = r#"{ "trackPrefs": { "ok.mp3": { "offset": 1 }, "bad.mp3": 42 } }"#;
        let imported = parse_project(json).unwrap();
        assert_eq!(imported.track_prefs.len(), 1);
        assert_eq!(imported.skipped, vec!["bad.mp3".to_string()]);
        assert!(imported.app_settings.is_none());
    }

    #[test]
    fn test_partial_eq_entry() {
        let json = r#"{ "trackPrefs": { "a.mp3": { "eq": { "low": 4 } } } }"#;
        let imported = parse_project(json).unwrap();
        assert_eq!(imported.track_prefs["a.mp3"].eq, Some(EqGains::new(4.0, 0.0, 0.0)));
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(parse_project("{ nope"), Err(EngineError::ProjectJson(_))));
        assert!(matches!(parse_project("[1, 2]"), Err(EngineError::InvalidProject(_))));
        assert!(matches!(
            parse_project(r#"{ "trackPrefs": "x" }"#),
            Err(EngineError::InvalidProject(_))
        ));
    }

    #[test]
    fn test_suggested_file_name() {
        assert_eq!(
            suggested_file_name(exported_at()),
            "syncinema_project_2026-10-16.sync"
        );
    }
}

//! Shell commands

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use syncinema_core::{
    suggested_file_name, AppSettings, CpalDeviceHost, DeviceCatalog, JsonPreferenceStore,
    PreferenceStore, ProjectAppSettings, ProjectFile, SyncConfig, SyncEngine,
};
use syncinema_dsp::{match_preset as find_preset, EqGains, PRESETS};
use tracing::{error, info};

use crate::sim::SimHost;

pub fn list_devices(json: bool) -> Result<()> {
    let catalog = DeviceCatalog::new(Arc::new(CpalDeviceHost::new()));
    catalog.refresh().context("Failed to enumerate audio devices")?;
    let devices = catalog.list();

    if json {
        println!("{}", serde_json::to_string_pretty(devices.as_ref())?);
        return Ok(());
    }

    println!("  {:<40} (system default)", "\"\"");
    for device in devices.iter() {
        println!("  {:<40} {}", format!("\"{}\"", device.device_id), device.display_name());
    }
    Ok(())
}

pub fn list_presets() -> Result<()> {
    for (name, gains) in PRESETS {
        println!(
            "  {:<10} low {:+5.1} dB  mid {:+5.1} dB  high {:+5.1} dB",
            name, gains.low, gains.mid, gains.high
        );
    }
    Ok(())
}

pub fn match_preset(low: f32, mid: f32, high: f32) -> Result<()> {
    let gains = EqGains::new(low, mid, high);
    println!("{}", find_preset(&gains).unwrap_or("custom"));
    Ok(())
}

pub fn export_project(output: Option<PathBuf>) -> Result<()> {
    let store = JsonPreferenceStore::open_default()?;
    let settings = AppSettings::load();
    let now = Utc::now();

    let project = ProjectFile::new(
        store.get_all(),
        ProjectAppSettings {
            master_volume: settings.master_volume,
            theme: settings.theme,
        },
        now,
    );

    let path = output.unwrap_or_else(|| PathBuf::from(suggested_file_name(now)));
    fs::write(&path, project.to_json()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Exported {} track settings to {:?}", project.track_prefs.len(), path);
    println!("{}", path.display());
    Ok(())
}

/// Replace the saved track settings with a project file's
///
/// No tracks are loaded here, so entries take effect the next time a track
/// with a matching file name is added.
pub fn import_project(path: &Path) -> Result<()> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let store = JsonPreferenceStore::open_default()?;
    let mut engine = SyncEngine::new(
        SyncConfig::default(),
        Box::new(SimHost::new()),
        Arc::new(CpalDeviceHost::new()),
        Box::new(store),
        AppSettings::load(),
    )?;

    let result = engine.import_project(&json, std::time::Instant::now());
    for event in engine.events() {
        if let Some(summary) = event.import_summary() {
            println!("{}", summary);
        }
    }
    result?;

    if let Err(e) = engine.settings().save() {
        error!("Failed to save settings: {}", e);
    }
    Ok(())
}

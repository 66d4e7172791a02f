//! Track Preference Store
//!
//! Filename-keyed preferences (offset, rate, device, EQ, compressor) that
//! survive across sessions. The store has no transactional guarantees;
//! every write comes from the engine's single control thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::error::{EngineError, EngineResult};
use crate::settings::AppSettings;
use crate::track::TrackPrefs;

/// Key-value store for per-track preferences
pub trait PreferenceStore {
    fn get(&self, name: &str) -> Option<TrackPrefs>;

    fn set(&mut self, name: &str, prefs: TrackPrefs);

    fn get_all(&self) -> BTreeMap<String, TrackPrefs>;

    /// Replace the whole map (project import)
    fn replace_all(&mut self, prefs: BTreeMap<String, TrackPrefs>);
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferenceStore {
    prefs: BTreeMap<String, TrackPrefs>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, name: &str) -> Option<TrackPrefs> {
        self.prefs.get(name).cloned()
    }

    fn set(&mut self, name: &str, prefs: TrackPrefs) {
        self.prefs.insert(name.to_string(), prefs);
    }

    fn get_all(&self) -> BTreeMap<String, TrackPrefs> {
        self.prefs.clone()
    }

    fn replace_all(&mut self, prefs: BTreeMap<String, TrackPrefs>) {
        self.prefs = prefs;
    }
}

/// JSON file store, rewritten on every change
///
/// Reads are served from memory. A failed write is logged and the
/// in-memory state still reflects the change.
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    prefs: BTreeMap<String, TrackPrefs>,
}

impl JsonPreferenceStore {
    /// Open the store in the platform config directory
    pub fn open_default() -> EngineResult<Self> {
        let dir = AppSettings::config_dir()
            .ok_or_else(|| EngineError::Storage("Could not determine config path".into()))?;
        Ok(Self::open(dir.join("track_prefs.json")))
    }

    /// Open (or lazily create) a store at `path`; corrupt files start empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = Self::read(&path).unwrap_or_default();
        Self { path, prefs }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Option<BTreeMap<String, TrackPrefs>> {
        if !path.exists() {
            return None;
        }
        let file = fs::File::open(path)
            .map_err(|e| error!("Failed to open preference file: {}", e))
            .ok()?;
        match serde_json::from_reader(file) {
            Ok(prefs) => {
                info!("Track preferences loaded from {:?}", path);
                Some(prefs)
            }
            Err(e) => {
                error!("Failed to parse preference file: {}", e);
                None
            }
        }
    }

    fn flush(&self) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Storage(e.to_string()))?;
        }
        let file = fs::File::create(&self.path).map_err(|e| EngineError::Storage(e.to_string()))?;
        serde_json::to_writer_pretty(file, &self.prefs)
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        debug!("Track preferences written to {:?}", self.path);
        Ok(())
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            error!("Failed to save track preferences: {}", e);
        }
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self, name: &str) -> Option<TrackPrefs> {
        self.prefs.get(name).cloned()
    }

    fn set(&mut self, name: &str, prefs: TrackPrefs) {
        self.prefs.insert(name.to_string(), prefs);
        self.flush_logged();
    }

    fn get_all(&self) -> BTreeMap<String, TrackPrefs> {
        self.prefs.clone()
    }

    fn replace_all(&mut self, prefs: BTreeMap<String, TrackPrefs>) {
        self.prefs = prefs;
        self.flush_logged();
    }
}

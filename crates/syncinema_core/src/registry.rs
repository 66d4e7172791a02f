//! Track Registry
//!
//! Owns the authoritative track list and writes persisted fields through
//! to the preference store, keyed by track name.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::host::MediaHost;
use crate::prefs::PreferenceStore;
use crate::track::{
    apply_update, AudioTrack, TrackChanges, TrackId, TrackPrefs, TrackPrefsPatch, TrackSource,
    TrackUpdate,
};

/// Result of applying an imported preference map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefsImport {
    /// Entries in the imported map
    pub total: usize,
    /// Loaded tracks whose name matched, with what changed on each
    pub matched: Vec<(TrackId, TrackChanges)>,
}

pub struct TrackRegistry {
    tracks: Vec<AudioTrack>,
    next_id: u64,
    store: Box<dyn PreferenceStore>,
}

impl TrackRegistry {
    pub fn new(store: Box<dyn PreferenceStore>) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            store,
        }
    }

    /// Register sources as tracks, seeded from saved preferences
    ///
    /// Results are in input order. A source the host cannot open fails on
    /// its own; the rest are still added.
    pub fn add(&mut self, sources: &[TrackSource], host: &mut dyn MediaHost) -> Vec<EngineResult<TrackId>> {
        sources
            .iter()
            .map(|source| {
                let resource = host.allocate(source).map_err(|e| {
                    warn!("Could not load '{}': {}", source.name, e);
                    e
                })?;

                let prefs = self.store.get(&source.name).unwrap_or_default();
                if prefs != TrackPrefs::default() {
                    debug!("Restoring saved settings for '{}'", source.name);
                }

                let id = TrackId::new(self.next_id);
                self.next_id += 1;
                self.tracks
                    .push(AudioTrack::new(id, source.name.clone(), resource, prefs));
                info!("Added {} '{}' ({})", id, source.name, resource);
                Ok(id)
            })
            .collect()
    }

    /// Merge a partial update into a track
    ///
    /// If the update names any persisted field, the track's persisted
    /// subset is written under its current name.
    pub fn update(&mut self, id: TrackId, update: &TrackUpdate) -> EngineResult<TrackChanges> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EngineError::TrackNotFound(id))?;

        let before = track.clone();
        apply_update(track, update);

        if update.touches_prefs() {
            self.store.set(&track.name, track.prefs());
        }

        Ok(TrackChanges::between(&before, track))
    }

    /// Delete a track and release its resource
    ///
    /// Returns `None` if the track was already removed.
    pub fn remove(&mut self, id: TrackId, host: &mut dyn MediaHost) -> Option<AudioTrack> {
        let index = self.tracks.iter().position(|t| t.id == id)?;
        let track = self.tracks.remove(index);
        host.release(track.resource);
        info!("Removed {} '{}'", id, track.name);
        Some(track)
    }

    pub fn get(&self, id: TrackId) -> Option<&AudioTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The whole stored preference map, including tracks not loaded now
    pub fn export_prefs(&self) -> BTreeMap<String, TrackPrefs> {
        self.store.get_all()
    }

    /// Replace the stored map and apply matching entries to loaded tracks
    ///
    /// Stored entries are completed with defaults; live tracks keep their
    /// current value for any field an entry omits.
    pub fn import_prefs(&mut self, prefs: &BTreeMap<String, TrackPrefsPatch>) -> PrefsImport {
        let defaults = TrackPrefs::default();
        let stored = prefs
            .iter()
            .map(|(name, patch)| (name.clone(), patch.resolve(&defaults)))
            .collect();
        self.store.replace_all(stored);

        let mut matched = Vec::new();
        for track in &mut self.tracks {
            let Some(patch) = prefs.get(&track.name) else {
                continue;
            };
            debug!("Matching settings found for track '{}'", track.name);
            let before = track.clone();
            let resolved = patch.resolve(&track.prefs());
            track.apply_prefs(&resolved);
            matched.push((track.id, TrackChanges::between(&before, track)));
        }

        PrefsImport {
            total: prefs.len(),
            matched,
        }
    }
}

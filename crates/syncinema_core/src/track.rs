//! Audio Track Model
//!
//! One `AudioTrack` exists per loaded external audio file. The track's
//! `name` (the filename) doubles as the key for persisted preferences, so
//! two tracks sharing a filename share one preference entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use syncinema_dsp::EqGains;

/// Allowed playback-rate range for drift trimming
pub const MIN_PLAYBACK_RATE: f64 = 0.5;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

/// Step used by the shell's -/+ rate buttons
pub const PLAYBACK_RATE_STEP: f64 = 0.001;

/// Opaque track identifier, never reused within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Handle to a playable media resource allocated by the host
/// (the equivalent of an object URL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// A file or URL handed over by the ingestion layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSource {
    /// Display name, usually the filename ("commentary.mp3")
    pub name: String,
    /// Path or URL the host can open
    pub location: String,
}

impl TrackSource {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// The per-track fields saved under the track's filename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackPrefs {
    pub offset: f64,
    pub playback_rate: f64,
    pub device_id: String,
    pub eq: EqGains,
    pub use_compressor: bool,
}

impl Default for TrackPrefs {
    fn default() -> Self {
        Self {
            offset: 0.0,
            playback_rate: 1.0,
            device_id: String::new(),
            eq: EqGains::FLAT,
            use_compressor: false,
        }
    }
}

/// A preference entry as read from an imported project
///
/// Entries written by older versions may omit fields; an absent field
/// keeps whatever value the target already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPrefsPatch {
    pub offset: Option<f64>,
    pub playback_rate: Option<f64>,
    pub device_id: Option<String>,
    pub eq: Option<EqGains>,
    pub use_compressor: Option<bool>,
}

impl TrackPrefsPatch {
    /// Overlay this patch on `base`
    pub fn resolve(&self, base: &TrackPrefs) -> TrackPrefs {
        TrackPrefs {
            offset: self.offset.unwrap_or(base.offset),
            playback_rate: self.playback_rate.unwrap_or(base.playback_rate),
            device_id: self.device_id.clone().unwrap_or_else(|| base.device_id.clone()),
            eq: self.eq.unwrap_or(base.eq),
            use_compressor: self.use_compressor.unwrap_or(base.use_compressor),
        }
    }
}

impl From<&TrackPrefs> for TrackPrefsPatch {
    fn from(prefs: &TrackPrefs) -> Self {
        Self {
            offset: Some(prefs.offset),
            playback_rate: Some(prefs.playback_rate),
            device_id: Some(prefs.device_id.clone()),
            eq: Some(prefs.eq),
            use_compressor: Some(prefs.use_compressor),
        }
    }
}

/// Full mutable state of one loaded audio track
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub id: TrackId,
    pub name: String,
    pub resource: ResourceId,
    /// Seconds; audio target = video time - offset
    pub offset: f64,
    pub playback_rate: f64,
    /// Empty string = system default output
    pub device_id: String,
    pub volume: f32,
    pub is_muted: bool,
    pub eq: EqGains,
    pub use_compressor: bool,
}

impl AudioTrack {
    pub(crate) fn new(id: TrackId, name: String, resource: ResourceId, prefs: TrackPrefs) -> Self {
        let mut track = Self {
            id,
            name,
            resource,
            offset: 0.0,
            playback_rate: 1.0,
            device_id: String::new(),
            volume: 1.0,
            is_muted: false,
            eq: EqGains::FLAT,
            use_compressor: false,
        };
        track.apply_prefs(&prefs);
        track
    }

    /// Snapshot of the persisted subset
    pub fn prefs(&self) -> TrackPrefs {
        TrackPrefs {
            offset: self.offset,
            playback_rate: self.playback_rate,
            device_id: self.device_id.clone(),
            eq: self.eq,
            use_compressor: self.use_compressor,
        }
    }

    pub(crate) fn apply_prefs(&mut self, prefs: &TrackPrefs) {
        self.offset = sanitize_offset(prefs.offset);
        self.playback_rate = clamp_playback_rate(prefs.playback_rate);
        self.device_id = prefs.device_id.clone();
        self.eq = prefs.eq.clamped();
        self.use_compressor = prefs.use_compressor;
    }

    /// Unclamped target position; negative while the track has not reached
    /// its start point
    pub fn raw_target(&self, video_time: f64) -> f64 {
        video_time - self.offset
    }

    /// Position the track should be at for a given video time
    pub fn target_time(&self, video_time: f64) -> f64 {
        self.raw_target(video_time).max(0.0)
    }

    /// Playback rate after `steps` presses of the -/+ buttons
    pub fn nudged_rate(&self, steps: i32) -> f64 {
        let nudged = self.playback_rate + f64::from(steps) * PLAYBACK_RATE_STEP;
        clamp_playback_rate((nudged * 10_000.0).round() / 10_000.0)
    }
}

/// Partial update of a track, as issued by the shell
///
/// Only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdate {
    pub offset: Option<f64>,
    pub playback_rate: Option<f64>,
    pub device_id: Option<String>,
    pub volume: Option<f32>,
    pub is_muted: Option<bool>,
    pub eq: Option<EqGains>,
    pub use_compressor: Option<bool>,
}

impl TrackUpdate {
    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = Some(rate);
        self
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.is_muted = Some(muted);
        self
    }

    pub fn eq(mut self, eq: EqGains) -> Self {
        self.eq = Some(eq);
        self
    }

    pub fn compressor(mut self, enabled: bool) -> Self {
        self.use_compressor = Some(enabled);
        self
    }

    /// Whether this update touches a field saved under the track name
    pub fn touches_prefs(&self) -> bool {
        self.offset.is_some()
            || self.playback_rate.is_some()
            || self.device_id.is_some()
            || self.eq.is_some()
            || self.use_compressor.is_some()
    }
}

/// Which fields actually changed after an update or import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackChanges {
    pub offset: bool,
    pub playback_rate: bool,
    pub device: bool,
    pub volume: bool,
    pub mute: bool,
    pub eq: bool,
    pub compressor: bool,
}

impl TrackChanges {
    pub fn between(before: &AudioTrack, after: &AudioTrack) -> Self {
        Self {
            offset: before.offset != after.offset,
            playback_rate: before.playback_rate != after.playback_rate,
            device: before.device_id != after.device_id,
            volume: before.volume != after.volume,
            mute: before.is_muted != after.is_muted,
            eq: before.eq != after.eq,
            compressor: before.use_compressor != after.use_compressor,
        }
    }

    pub fn any(&self) -> bool {
        self.offset
            || self.playback_rate
            || self.device
            || self.volume
            || self.mute
            || self.eq
            || self.compressor
    }
}

pub fn clamp_playback_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
    } else {
        1.0
    }
}

fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn sanitize_offset(offset: f64) -> f64 {
    if offset.is_finite() {
        offset
    } else {
        0.0
    }
}

pub(crate) fn apply_update(track: &mut AudioTrack, update: &TrackUpdate) {
    if let Some(offset) = update.offset {
        track.offset = sanitize_offset(offset);
    }
    if let Some(rate) = update.playback_rate {
        track.playback_rate = clamp_playback_rate(rate);
    }
    if let Some(device_id) = &update.device_id {
        track.device_id = device_id.clone();
    }
    if let Some(volume) = update.volume {
        track.volume = sanitize_volume(volume);
    }
    if let Some(muted) = update.is_muted {
        track.is_muted = muted;
    }
    if let Some(eq) = update.eq {
        track.eq = eq.clamped();
    }
    if let Some(enabled) = update.use_compressor {
        track.use_compressor = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(offset: f64) -> AudioTrack {
        AudioTrack::new(
            TrackId::new(1),
            "en.mp3".into(),
            ResourceId(1),
            TrackPrefs {
                offset,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_default_prefs() {
        let prefs = TrackPrefs::default();
        assert_eq!(prefs.offset, 0.0);
        assert_eq!(prefs.playback_rate, 1.0);
        assert!(prefs.device_id.is_empty());
        assert!(prefs.eq.is_flat());
        assert!(!prefs.use_compressor);
    }

    #[test]
    fn test_offset_sign() {
        let t = track(2.0);
        assert_eq!(t.raw_target(1.0), -1.0);
        assert_eq!(t.target_time(1.0), 0.0);
        assert_eq!(t.target_time(3.0), 1.0);

        let early = track(-1.2);
        assert!((early.target_time(0.0) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_rate_clamped() {
        let mut t = track(0.0);
        apply_update(&mut t, &TrackUpdate::default().playback_rate(5.0));
        assert_eq!(t.playback_rate, MAX_PLAYBACK_RATE);
        apply_update(&mut t, &TrackUpdate::default().playback_rate(0.1));
        assert_eq!(t.playback_rate, MIN_PLAYBACK_RATE);
        apply_update(&mut t, &TrackUpdate::default().playback_rate(f64::NAN));
        assert_eq!(t.playback_rate, 1.0);
    }

    #[test]
    fn test_rate_change_keeps_offset() {
        let mut t = track(1.5);
        apply_update(&mut t, &TrackUpdate::default().playback_rate(1.02));
        assert_eq!(t.offset, 1.5);
        assert_eq!(t.playback_rate, 1.02);
    }

    #[test]
    fn test_nudged_rate_rounds() {
        let t = track(0.0);
        assert_eq!(t.nudged_rate(1), 1.001);
        assert_eq!(t.nudged_rate(-3), 0.997);
        assert_eq!(t.nudged_rate(-10_000), MIN_PLAYBACK_RATE);
    }

    #[test]
    fn test_touches_prefs() {
        assert!(!TrackUpdate::default().volume(0.5).muted(true).touches_prefs());
        assert!(TrackUpdate::default().compressor(true).touches_prefs());
        assert!(TrackUpdate::default().device_id("").touches_prefs());
    }

    #[test]
    fn test_patch_keeps_missing_fields() {
        let base = TrackPrefs {
            offset: 0.5,
            use_compressor: true,
            ..Default::default()
        };
        let patch: TrackPrefsPatch = serde_json::from_str(r#"{ "offset": 2.0 }"#).unwrap();
        let resolved = patch.resolve(&base);
        assert_eq!(resolved.offset, 2.0);
        assert!(resolved.use_compressor);
        assert_eq!(resolved.playback_rate, 1.0);
    }

    #[test]
    fn test_prefs_json_shape() {
        let prefs = TrackPrefs {
            offset: 1.5,
            playback_rate: 1.02,
            device_id: "X".into(),
            eq: EqGains::new(3.0, 0.0, -2.0),
            use_compressor: true,
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["playbackRate"], 1.02);
        assert_eq!(json["deviceId"], "X");
        assert_eq!(json["useCompressor"], true);
        assert_eq!(json["eq"]["low"], 3.0);
    }

    #[test]
    fn test_changes_between() {
        let before = track(0.0);
        let mut after = before.clone();
        after.is_muted = true;
        let changes = TrackChanges::between(&before, &after);
        assert!(changes.mute);
        assert!(!changes.volume);
        assert!(changes.any());
    }
}

//! Message Types
//!
//! Commands flow from the shell to the sync engine.
//! Events flow from the sync engine to the shell over an unbounded channel;
//! the shell drains them after each clock tick or poll.

use serde::{Deserialize, Serialize};
use syncinema_dsp::EqGains;

use crate::clock::ClockSignal;
use crate::track::{TrackId, TrackSource, TrackUpdate};

/// Commands sent from the shell to the engine
#[derive(Debug, Clone)]
pub enum Command {
    /// Register files or URLs as tracks
    AddTracks(Vec<TrackSource>),

    /// Partial update of one track
    UpdateTrack { track_id: TrackId, update: TrackUpdate },

    /// Apply a named EQ preset to a track
    ApplyEqPreset { track_id: TrackId, preset: String },

    /// Step a track's playback rate by `steps` increments of 0.001
    NudgePlaybackRate { track_id: TrackId, steps: i32 },

    RemoveTrack(TrackId),

    /// Set master volume (0.0 - 1.0)
    SetMasterVolume(f32),

    /// Drift threshold in seconds, shared by every track
    SetSyncThreshold(f64),

    /// Master clock notification
    Clock(ClockSignal),

    /// Route the video element's own audio
    SetVideoDevice(String),

    /// Re-list output devices
    RefreshDevices,

    /// Apply a project file's contents
    ImportProject(String),
}

/// Events sent from the engine to the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// A track was registered and bound to a playback handle
    TrackAdded { track_id: TrackId, name: String },

    /// A track was deleted and its resource released
    TrackRemoved { track_id: TrackId },

    /// A track drifted past the threshold and was hard-seeked
    DriftCorrected {
        track_id: TrackId,
        drift: f64,
        target: f64,
    },

    /// The "drift corrected" indicator timed out
    DriftIndicatorCleared { track_id: TrackId },

    /// An output-device change began; mirroring and correction are suspended
    DeviceSwitchStarted { track_id: TrackId, device_id: String },

    /// The settle delay elapsed; `resumed` is true if playback was restarted
    DeviceSwitchSettled {
        track_id: TrackId,
        device_id: String,
        resumed: bool,
    },

    /// The host refused to start playback (autoplay policy)
    PlaybackDeferred { track_id: TrackId, message: String },

    /// Per-track output routing is not available on this host
    SinkUnsupported { track_id: TrackId },

    /// The output device list changed (hot-plug)
    DevicesChanged,

    /// A project file was applied
    ProjectImported {
        /// Preference entries found in the file
        total_prefs: usize,
        /// Loaded tracks whose settings were updated
        matched_tracks: usize,
        app_settings_restored: bool,
    },

    /// A project file could not be parsed (user-facing)
    ImportFailed { message: String },

    /// A track's signal chain could not be built; other tracks are unaffected
    ChainFailed { track_id: TrackId, message: String },

    /// Error occurred
    Error { message: String },
}

impl Command {
    /// Convenience for the common offset edit
    pub fn set_offset(track_id: TrackId, offset: f64) -> Self {
        Command::UpdateTrack {
            track_id,
            update: TrackUpdate::default().offset(offset),
        }
    }

    pub fn set_eq(track_id: TrackId, eq: EqGains) -> Self {
        Command::UpdateTrack {
            track_id,
            update: TrackUpdate::default().eq(eq),
        }
    }
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }

    /// User-facing summary line for an import result
    pub fn import_summary(&self) -> Option<String> {
        match self {
            Event::ProjectImported {
                total_prefs,
                matched_tracks,
                app_settings_restored,
            } => {
                let mut summary = format!(
                    "Project loaded! Found settings for {} tracks. {} active tracks updated.",
                    total_prefs, matched_tracks
                );
                if *app_settings_restored {
                    summary.push_str(" App settings restored.");
                }
                Some(summary)
            }
            Event::ImportFailed { message } => Some(format!(
                "Error parsing project file ({}). Please check that it is a valid .sync or .json file.",
                message
            )),
            _ => None,
        }
    }
}

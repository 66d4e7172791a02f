//! SynCinema Core - Sync Engine
//!
//! This crate keeps external audio tracks locked to a video's master clock:
//! - Track registry with per-name preferences that survive reloads
//! - Per-track playback controllers (drift correction, offsets, device switches)
//! - Per-track signal chains (3-band EQ, compressor, level meter, output sink)
//! - Output device catalog with hot-plug refresh
//! - Project file import/export
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Shell (UI / CLI)                       │
//! │  video clock ──ClockSignal──▶ SyncEngine ◀──Command── UI    │
//! │                                   │                         │
//! │                 Event ◀── crossbeam-channel                 │
//! └─────────────────────────────────────────────────────────────┘
//!                                     │
//!        ┌────────────────┬───────────┴──────┬─────────────────┐
//!        ▼                ▼                  ▼                 ▼
//!   TrackRegistry   TrackController     SignalGraph      DeviceCatalog
//!   (prefs store)   (per track, via     (EQ ▶ comp ▶     (via DeviceHost)
//!                    PlaybackHandle)     meter ▶ sink)
//! ```
//!
//! The engine never blocks and never spawns: timers are deadlines that the
//! shell services by calling `SyncEngine::poll`.

mod chain;
mod clock;
mod config;
mod controller;
mod device;
mod engine;
mod error;
mod host;
mod message;
mod mixer;
mod prefs;
mod project;
mod registry;
mod settings;
mod track;

#[cfg(test)]
mod testing;

pub use chain::{SignalChain, SignalGraph, SinkRouting};
pub use clock::{ClockSignal, ClockTick, MasterClock, PlayTransition, SyncClock};
pub use config::SyncConfig;
pub use controller::{ControllerState, DeviceSwitch, TrackController};
pub use device::{AudioDevice, CpalDeviceHost, DeviceCatalog, DeviceKind};
pub use engine::SyncEngine;
pub use error::{EngineError, EngineResult};
pub use host::{DeviceHost, MediaHost, OutputRouter, PlaybackHandle};
pub use message::{Command, Event};
pub use mixer::{EffectiveVolume, MasterMixer};
pub use prefs::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use project::{
    parse_project, suggested_file_name, AppSettingsPatch, ImportedProject, ProjectAppSettings,
    ProjectFile, PROJECT_EXTENSION, PROJECT_VERSION,
};
pub use registry::{PrefsImport, TrackRegistry};
pub use settings::AppSettings;
pub use track::{
    clamp_playback_rate, AudioTrack, ResourceId, TrackChanges, TrackId, TrackPrefs,
    TrackPrefsPatch, TrackSource, TrackUpdate,
};

// Re-export DSP types for convenience
pub use syncinema_dsp::{match_preset, preset_by_id, EqGains, LevelMeter, PRESETS};

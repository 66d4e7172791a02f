//! Sync Engine - Main Entry Point
//!
//! `SyncEngine` ties the track registry, per-track controllers, signal
//! graph, mixer, device catalog and master clock together. It lives on the
//! shell's event-loop thread and is driven cooperatively:
//!
//! ```text
//!   video element ──ClockSignal──▶ on_clock ──▶ controllers (mirror + drift)
//!   shell timers  ──────────────▶ poll     ──▶ settle deadlines, indicators,
//!                                              device hot-plug
//!   shell UI      ──Command─────▶ execute  ──▶ registry / graph / mixer
//!                                    │
//!                                    └──Event──▶ crossbeam channel ──▶ shell
//! ```
//!
//! Nothing blocks. Deferred work is expressed as deadlines; the shell asks
//! `next_deadline()` when to call `poll()` next.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use syncinema_dsp::{preset_by_id, LevelMeter};
use tracing::{debug, error, info, warn};

use crate::chain::{SignalGraph, SinkRouting};
use crate::clock::{ClockSignal, MasterClock, SyncClock};
use crate::config::SyncConfig;
use crate::controller::{ControllerState, TrackController};
use crate::device::{AudioDevice, DeviceCatalog};
use crate::error::{EngineError, EngineResult};
use crate::host::{DeviceHost, MediaHost, OutputRouter};
use crate::message::{Command, Event};
use crate::mixer::MasterMixer;
use crate::prefs::PreferenceStore;
use crate::project::{parse_project, ProjectAppSettings, ProjectFile};
use crate::registry::TrackRegistry;
use crate::settings::AppSettings;
use crate::track::{AudioTrack, TrackChanges, TrackId, TrackSource, TrackUpdate};

/// The multi-track sync and routing engine
pub struct SyncEngine {
    config: SyncConfig,
    settings: AppSettings,
    host: Box<dyn MediaHost>,
    devices: DeviceCatalog,
    registry: TrackRegistry,
    controllers: HashMap<TrackId, TrackController>,
    graph: SignalGraph,
    mixer: MasterMixer,
    clock: SyncClock,

    /// Output routing for the video element's own audio
    video_router: Option<Box<dyn OutputRouter>>,
    video_device: String,
    /// Sink last applied to the video router
    video_sink: Option<String>,

    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,
}

impl SyncEngine {
    /// Create an engine and take a first device listing
    ///
    /// The persisted sync threshold and master volume in `settings` take
    /// precedence over `config`. An out-of-range persisted threshold is
    /// ignored in favour of the configured one.
    pub fn new(
        mut config: SyncConfig,
        host: Box<dyn MediaHost>,
        device_host: Arc<dyn DeviceHost>,
        store: Box<dyn PreferenceStore>,
        mut settings: AppSettings,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let mut persisted = config.clone();
        persisted.sync_threshold_secs = settings.sync_threshold_secs;
        match persisted.validate() {
            Ok(()) => config = persisted,
            Err(e) => {
                warn!("Ignoring saved sync threshold: {}", e);
                settings.sync_threshold_secs = config.sync_threshold_secs;
            }
        }

        let (event_sender, event_receiver) = unbounded::<Event>();
        let devices = DeviceCatalog::new(device_host);
        if let Err(e) = devices.refresh() {
            warn!("Error fetching devices: {}", e);
        }

        info!(
            "Sync engine ready (threshold {:.2}s, settle {}ms, {} output devices)",
            config.sync_threshold_secs,
            config.settle_delay_ms,
            devices.list().len()
        );

        Ok(Self {
            graph: SignalGraph::new(config.sample_rate),
            mixer: MasterMixer::new(settings.master_volume),
            config,
            settings,
            host,
            devices,
            registry: TrackRegistry::new(store),
            controllers: HashMap::new(),
            clock: SyncClock::new(),
            video_router: None,
            video_device: String::new(),
            video_sink: None,
            event_sender,
            event_receiver,
        })
    }

    /// Dispatch one shell command
    pub fn execute(&mut self, command: Command, now: Instant) -> EngineResult<()> {
        match command {
            Command::AddTracks(sources) => {
                self.add_tracks(&sources, now);
            }
            Command::UpdateTrack { track_id, update } => self.update_track(track_id, &update, now)?,
            Command::ApplyEqPreset { track_id, preset } => self.apply_eq_preset(track_id, &preset, now)?,
            Command::NudgePlaybackRate { track_id, steps } => {
                self.nudge_playback_rate(track_id, steps, now)?;
            }
            Command::RemoveTrack(track_id) => {
                self.remove_track(track_id);
            }
            Command::SetMasterVolume(volume) => self.set_master_volume(volume),
            Command::SetSyncThreshold(secs) => self.set_sync_threshold(secs)?,
            Command::Clock(signal) => self.on_clock(signal, now),
            Command::SetVideoDevice(device_id) => self.set_video_device(&device_id),
            Command::RefreshDevices => self.refresh_devices(now)?,
            Command::ImportProject(json) => self.import_project(&json, now)?,
        }
        Ok(())
    }

    // ─── Tracks ────────────────────────────────────────────────────────────

    /// Register sources, bind each to a controller and build its chain
    ///
    /// Returns the ids of the tracks that were added. Failures are isolated
    /// per source and reported as events.
    pub fn add_tracks(&mut self, sources: &[TrackSource], now: Instant) -> Vec<TrackId> {
        let results = self.registry.add(sources, self.host.as_mut());
        let mut added = Vec::new();

        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(id) => {
                    if self.bind_track(id, now) {
                        added.push(id);
                    }
                }
                Err(e) => self.emit(Event::error(format!("Could not load {}: {}", source.name, e))),
            }
        }

        added
    }

    fn bind_track(&mut self, id: TrackId, now: Instant) -> bool {
        let Some(track) = self.registry.get(id) else {
            return false;
        };

        let handle = match self.host.open_playback(track.resource) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Could not open playback for {}: {}", id, e);
                self.emit(Event::error(format!("Could not play {}: {}", track.name, e)));
                self.registry.remove(id, self.host.as_mut());
                return false;
            }
        };

        let mut controller = TrackController::new(id, self.config.clone(), self.event_sender.clone());
        let volume = self.mixer.effective(track.volume, track.is_muted);
        controller.bind(handle, track, volume, self.clock.current());

        let sink = self.devices.resolve(&track.device_id);
        if let Err(e) = self.graph.attach(self.host.as_mut(), track, &sink) {
            error!("Audio graph error for {}: {}", id, e);
            let _ = self.event_sender.send(Event::ChainFailed {
                track_id: id,
                message: e.to_string(),
            });
        }

        // A saved device goes through the same settle as a live change
        if !track.device_id.is_empty() {
            controller.begin_device_switch(&track.device_id, now);
        }

        let _ = self.event_sender.send(Event::TrackAdded {
            track_id: id,
            name: track.name.clone(),
        });
        self.controllers.insert(id, controller);
        true
    }

    /// Merge a partial update and apply whatever changed
    pub fn update_track(&mut self, id: TrackId, update: &TrackUpdate, now: Instant) -> EngineResult<()> {
        let changes = self.registry.update(id, update)?;
        self.apply_changes(id, changes, now);
        Ok(())
    }

    /// Equivalent to writing all three bands at once
    pub fn apply_eq_preset(&mut self, id: TrackId, preset: &str, now: Instant) -> EngineResult<()> {
        let gains = preset_by_id(preset).ok_or_else(|| EngineError::UnknownPreset(preset.to_string()))?;
        self.update_track(id, &TrackUpdate::default().eq(gains), now)
    }

    /// Step the playback rate by `steps` x 0.001; returns the new rate
    pub fn nudge_playback_rate(&mut self, id: TrackId, steps: i32, now: Instant) -> EngineResult<f64> {
        let rate = self
            .registry
            .get(id)
            .ok_or(EngineError::TrackNotFound(id))?
            .nudged_rate(steps);
        self.update_track(id, &TrackUpdate::default().playback_rate(rate), now)?;
        Ok(rate)
    }

    /// Delete a track: cancels its timers, drops its chain and releases the
    /// resource. Safe to call twice.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        if let Some(mut controller) = self.controllers.remove(&id) {
            controller.release();
        }

        let Some(track) = self.registry.remove(id, self.host.as_mut()) else {
            debug!("{} already removed", id);
            return false;
        };
        self.graph.detach(track.resource);
        self.emit(Event::TrackRemoved { track_id: id });
        true
    }

    fn apply_changes(&mut self, id: TrackId, changes: TrackChanges, now: Instant) {
        if !changes.any() {
            return;
        }
        let Some(track) = self.registry.get(id) else {
            return;
        };

        if changes.eq || changes.compressor {
            if let Some(chain) = self.graph.get_mut(track.resource) {
                if changes.eq {
                    if let Err(e) = chain.set_eq(track.eq) {
                        error!("Failed to apply EQ for {}: {}", id, e);
                    }
                }
                if changes.compressor {
                    chain.set_compressor(track.use_compressor);
                }
            }
        }

        let Some(controller) = self.controllers.get_mut(&id) else {
            return;
        };

        if changes.playback_rate {
            controller.set_playback_rate(track.playback_rate);
        }
        if changes.volume || changes.mute {
            controller.apply_volume(self.mixer.effective(track.volume, track.is_muted));
        }
        if changes.offset {
            controller.sync(track, self.clock.current(), now);
        }

        if changes.device {
            let sink = self.devices.resolve(&track.device_id);
            if let Some(chain) = self.graph.get_mut(track.resource) {
                match chain.set_sink(&sink) {
                    Ok(SinkRouting::Routed) => {}
                    Ok(SinkRouting::Unsupported) => {
                        let _ = self.event_sender.send(Event::SinkUnsupported { track_id: id });
                    }
                    Err(e) => error!("Failed to switch output device for {}: {}", id, e),
                }
            }
            controller.begin_device_switch(&track.device_id, now);
        }
    }

    // ─── Mixer ─────────────────────────────────────────────────────────────

    pub fn master_volume(&self) -> f32 {
        self.mixer.master()
    }

    /// Set the master level and re-apply every track's effective volume
    pub fn set_master_volume(&mut self, volume: f32) {
        if !self.mixer.set_master(volume) {
            return;
        }
        self.settings.master_volume = self.mixer.master();
        debug!("Master volume set to {:.2}", self.mixer.master());

        for track in self.registry.tracks() {
            if let Some(controller) = self.controllers.get_mut(&track.id) {
                controller.apply_volume(self.mixer.effective(track.volume, track.is_muted));
            }
        }
    }

    pub fn set_sync_threshold(&mut self, threshold_secs: f64) -> EngineResult<()> {
        let mut config = self.config.clone();
        config.sync_threshold_secs = threshold_secs;
        config.validate().map_err(EngineError::ConfigError)?;

        self.config = config;
        self.settings.sync_threshold_secs = threshold_secs;
        for controller in self.controllers.values_mut() {
            controller.set_sync_threshold(threshold_secs);
        }
        info!("Sync threshold set to {:.2}s", threshold_secs);
        Ok(())
    }

    // ─── Clock & timers ────────────────────────────────────────────────────

    /// Feed a master clock notification
    ///
    /// Due deadlines fire against the updated clock before controllers see
    /// the tick.
    pub fn on_clock(&mut self, signal: ClockSignal, now: Instant) {
        let tick = self.clock.apply(signal);
        self.poll(now);

        let Some(tick) = tick else {
            return;
        };
        for track in self.registry.tracks() {
            if let Some(controller) = self.controllers.get_mut(&track.id) {
                controller.on_clock(&tick, track, now);
            }
        }
    }

    /// Fire due deadlines and pick up device hot-plug notifications
    pub fn poll(&mut self, now: Instant) {
        if self.devices.poll_changes() {
            self.emit(Event::DevicesChanged);
            self.reroute_tracks(now);
        }

        let clock = self.clock.current();
        for track in self.registry.tracks() {
            if let Some(controller) = self.controllers.get_mut(&track.id) {
                controller.poll(track, clock, now);
            }
        }
    }

    /// When `poll` next has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.controllers
            .values()
            .filter_map(TrackController::next_deadline)
            .min()
    }

    pub fn clock(&self) -> MasterClock {
        self.clock.current()
    }

    // ─── Devices ───────────────────────────────────────────────────────────

    /// Re-list devices and move anything routed to a vanished device
    pub fn refresh_devices(&mut self, now: Instant) -> EngineResult<()> {
        self.devices.refresh().map_err(|e| {
            error!("Error fetching devices: {}", e);
            e
        })?;
        self.emit(Event::DevicesChanged);
        self.reroute_tracks(now);
        Ok(())
    }

    pub fn devices(&self) -> Arc<Vec<AudioDevice>> {
        self.devices.list()
    }

    pub fn permission_granted(&self) -> bool {
        self.devices.permission_granted()
    }

    /// Re-resolve every track and the video after the device list changed
    ///
    /// Switch events carry the track's logical device, not the fallback.
    fn reroute_tracks(&mut self, now: Instant) {
        for track in self.registry.tracks() {
            let sink = self.devices.resolve(&track.device_id);
            let Some(chain) = self.graph.get_mut(track.resource) else {
                continue;
            };
            if chain.sink_id() == sink {
                continue;
            }
            match chain.set_sink(&sink) {
                Ok(SinkRouting::Routed) => {
                    if let Some(controller) = self.controllers.get_mut(&track.id) {
                        controller.begin_device_switch(&track.device_id, now);
                    }
                }
                Ok(SinkRouting::Unsupported) => {}
                Err(e) => error!("Failed to reroute {}: {}", track.id, e),
            }
        }

        let video_sink = self.devices.resolve(&self.video_device);
        if self.video_router.is_some() && self.video_sink.as_deref() != Some(video_sink.as_str()) {
            let device_id = self.video_device.clone();
            self.set_video_device(&device_id);
        }
    }

    /// Route the video element's own audio
    pub fn attach_video_router(&mut self, router: Box<dyn OutputRouter>) {
        self.video_router = Some(router);
        let device_id = self.video_device.clone();
        self.set_video_device(&device_id);
    }

    pub fn set_video_device(&mut self, device_id: &str) {
        self.video_device = device_id.to_string();
        let sink = self.devices.resolve(device_id);
        let Some(router) = self.video_router.as_mut() else {
            debug!("No video router attached yet");
            return;
        };

        if !router.supports_sink_selection() {
            warn!("Video output device selection not supported by host");
            return;
        }
        match router.set_sink(&sink) {
            Ok(()) => {
                info!(
                    "Video output set to {}",
                    if sink.is_empty() { "default" } else { sink.as_str() }
                );
                self.video_sink = Some(sink);
            }
            Err(e) => error!("Failed to set video output device: {}", e),
        }
    }

    pub fn video_device(&self) -> &str {
        &self.video_device
    }

    // ─── Project ───────────────────────────────────────────────────────────

    /// Snapshot the stored preferences and app settings
    pub fn export_project(&self, exported_at: DateTime<Utc>) -> ProjectFile {
        ProjectFile::new(
            self.registry.export_prefs(),
            ProjectAppSettings {
                master_volume: self.mixer.master(),
                theme: self.settings.theme.clone(),
            },
            exported_at,
        )
    }

    /// Apply a project file
    ///
    /// The stored preference map is replaced; loaded tracks with a matching
    /// name pick their entries up immediately. The outcome is reported as a
    /// `ProjectImported` or `ImportFailed` event.
    pub fn import_project(&mut self, json: &str, now: Instant) -> EngineResult<()> {
        let imported = match parse_project(json) {
            Ok(imported) => imported,
            Err(e) => {
                error!("Failed to load project: {}", e);
                self.emit(Event::ImportFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let outcome = self.registry.import_prefs(&imported.track_prefs);
        for (id, changes) in &outcome.matched {
            self.apply_changes(*id, *changes, now);
        }

        let app_settings_restored = imported.app_settings.is_some();
        if let Some(app) = imported.app_settings {
            if let Some(volume) = app.master_volume {
                self.set_master_volume(volume);
            }
            if let Some(theme) = app.theme {
                self.settings.theme = theme;
            }
        }

        info!(
            "Project loaded: {} entries, {} active tracks updated",
            outcome.total,
            outcome.matched.len()
        );
        self.emit(Event::ProjectImported {
            total_prefs: outcome.total,
            matched_tracks: outcome.matched.len(),
            app_settings_restored,
        });
        Ok(())
    }

    // ─── Signal path ───────────────────────────────────────────────────────

    /// Run a block of a track's decoded audio through its chain
    ///
    /// Returns false if the track has no chain.
    pub fn render(&mut self, id: TrackId, buffer: &mut [f32]) -> bool {
        let Some(track) = self.registry.get(id) else {
            return false;
        };
        match self.graph.get_mut(track.resource) {
            Some(chain) => {
                chain.process(buffer);
                true
            }
            None => false,
        }
    }

    pub fn meter(&self, id: TrackId) -> Option<Arc<LevelMeter>> {
        let track = self.registry.get(id)?;
        self.graph.get(track.resource).map(|chain| chain.meter())
    }

    /// Run one meter analysis for the track (call at display rate)
    pub fn track_level(&self, id: TrackId) -> Option<f32> {
        self.meter(id).map(|meter| meter.update())
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    pub fn tracks(&self) -> &[AudioTrack] {
        self.registry.tracks()
    }

    pub fn track(&self, id: TrackId) -> Option<&AudioTrack> {
        self.registry.get(id)
    }

    pub fn controller_state(&self, id: TrackId) -> Option<&ControllerState> {
        self.controllers.get(&id).map(TrackController::state)
    }

    pub fn drift_warning(&self, id: TrackId) -> bool {
        self.controllers
            .get(&id)
            .map(TrackController::drift_warning)
            .unwrap_or(false)
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Drain all pending events
    pub fn events(&self) -> Vec<Event> {
        self.event_receiver.try_iter().collect()
    }

    /// Extra receiver for a shell that drains events elsewhere
    pub fn subscribe(&self) -> Receiver<Event> {
        self.event_receiver.clone()
    }

    fn emit(&self, event: Event) {
        let _ = self.event_sender.send(event);
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for id in self.registry.ids() {
            self.remove_track(id);
        }
    }
}

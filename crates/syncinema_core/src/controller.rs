//! Per-Track Playback Controller
//!
//! One controller per track. It owns the track's playback handle, mirrors
//! the master play state onto it, corrects drift against the master clock
//! and runs the output-device switch lifecycle.
//!
//! # States
//!
//! ```text
//!            bind                 master play, target >= 0
//!   Idle ──────────▶ Bound ─────────────────────────────────▶ Playing
//!                      │  master play, target < 0                ▲ │
//!                      └──────────────▶ AwaitingStart ───────────┘ │
//!                                          (tick reaches target)   │
//!   {Bound, Paused, AwaitingStart, Playing} ── device change ──▶ SwitchingDevice
//!   SwitchingDevice ── settle deadline ──▶ {Playing, AwaitingStart, Paused}
//! ```
//!
//! Timers are deadlines checked by `poll(now)`; nothing here sleeps. A new
//! device change replaces the pending `SwitchingDevice` state, so a stale
//! settle deadline cannot fire.

use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::clock::{ClockTick, MasterClock, PlayTransition};
use crate::config::SyncConfig;
use crate::host::PlaybackHandle;
use crate::message::Event;
use crate::mixer::EffectiveVolume;
use crate::track::{AudioTrack, TrackId};

/// Pending output-device change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSwitch {
    pub device_id: String,
    pub settle_at: Instant,
    /// Increments per switch; only the latest one is ever live
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// No playback handle yet, or released
    Idle,
    /// Handle attached, master has not played since
    Bound,
    Paused,
    /// Master is playing but the track's start point is still ahead
    AwaitingStart,
    Playing,
    /// Mirroring and drift correction suspended until `settle_at`
    SwitchingDevice(DeviceSwitch),
}

impl ControllerState {
    pub fn is_switching(&self) -> bool {
        matches!(self, ControllerState::SwitchingDevice(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Bound => "bound",
            ControllerState::Paused => "paused",
            ControllerState::AwaitingStart => "awaiting-start",
            ControllerState::Playing => "playing",
            ControllerState::SwitchingDevice(_) => "switching-device",
        }
    }
}

pub struct TrackController {
    track_id: TrackId,
    config: SyncConfig,
    handle: Option<Box<dyn PlaybackHandle>>,
    state: ControllerState,
    switch_generation: u64,
    last_correction: Option<Instant>,
    indicator_until: Option<Instant>,
    events: Sender<Event>,
}

impl TrackController {
    pub fn new(track_id: TrackId, config: SyncConfig, events: Sender<Event>) -> Self {
        Self {
            track_id,
            config,
            handle: None,
            state: ControllerState::Idle,
            switch_generation: 0,
            last_correction: None,
            indicator_until: None,
            events,
        }
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// True while the "drift corrected" indicator is raised
    pub fn drift_warning(&self) -> bool {
        self.indicator_until.is_some()
    }

    pub fn set_sync_threshold(&mut self, threshold_secs: f64) {
        self.config.sync_threshold_secs = threshold_secs;
    }

    /// Attach the playback handle and mirror the current master state
    pub fn bind(
        &mut self,
        mut handle: Box<dyn PlaybackHandle>,
        track: &AudioTrack,
        volume: EffectiveVolume,
        clock: MasterClock,
    ) {
        handle.set_playback_rate(track.playback_rate);
        handle.set_volume(volume.gain);
        handle.set_muted(volume.muted);
        handle.seek(track.target_time(clock.current_time));
        self.handle = Some(handle);
        self.state = ControllerState::Bound;
        debug!("{} bound", self.track_id);

        if clock.is_playing {
            self.start_or_arm(track, clock);
        }
    }

    /// Feed one accepted clock sample
    pub fn on_clock(&mut self, tick: &ClockTick, track: &AudioTrack, now: Instant) {
        if let Some(transition) = tick.transition {
            self.on_play_state(transition, track, tick.clock);
        }
        self.sync(track, tick.clock, now);
    }

    /// Mirror a master play/pause edge
    ///
    /// Suspended while a device switch is settling; the settle step reads
    /// the master state itself.
    pub fn on_play_state(&mut self, transition: PlayTransition, track: &AudioTrack, clock: MasterClock) {
        match self.state {
            ControllerState::Idle => return,
            ControllerState::SwitchingDevice(_) => {
                debug!("{} play state {:?} ignored while switching device", self.track_id, transition);
                return;
            }
            _ => {}
        }

        match transition {
            PlayTransition::Started => self.start_or_arm(track, clock),
            PlayTransition::Stopped => {
                self.pause_handle();
                self.state = ControllerState::Paused;
            }
        }
    }

    /// Drift check, evaluated on every tick
    ///
    /// Acts at most once per throttle window since the previous correction.
    pub fn sync(&mut self, track: &AudioTrack, clock: MasterClock, now: Instant) {
        let raw_target = track.raw_target(clock.current_time);

        match self.state {
            ControllerState::Idle | ControllerState::SwitchingDevice(_) => return,
            ControllerState::AwaitingStart => {
                if raw_target >= 0.0 {
                    if let Some(handle) = self.handle.as_mut() {
                        handle.seek(raw_target);
                    }
                    self.try_play();
                }
                return;
            }
            ControllerState::Playing if raw_target < 0.0 => {
                // Offset moved the start point ahead of the playhead
                self.pause_handle();
                if let Some(handle) = self.handle.as_mut() {
                    handle.seek(0.0);
                }
                self.state = ControllerState::AwaitingStart;
                return;
            }
            _ => {}
        }

        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let target = raw_target.max(0.0);
        let drift = (handle.current_time() - target).abs();
        if drift <= self.config.sync_threshold_secs {
            return;
        }

        if let Some(last) = self.last_correction {
            if now.saturating_duration_since(last) < self.config.drift_throttle() {
                return;
            }
        }

        handle.seek(target);
        self.last_correction = Some(now);
        self.indicator_until = Some(now + self.config.drift_indicator());
        debug!("{} drift {:.3}s corrected to {:.3}s", self.track_id, drift, target);
        let _ = self.events.send(Event::DriftCorrected {
            track_id: self.track_id,
            drift,
            target,
        });
    }

    /// Start (or restart) an output-device change
    ///
    /// Any pending switch is superseded: only the latest settle deadline
    /// remains, so exactly one resume attempt follows a burst of changes.
    pub fn begin_device_switch(&mut self, device_id: &str, now: Instant) {
        if self.handle.is_none() {
            debug!("{} has no playback handle, device switch skipped", self.track_id);
            return;
        }

        if let ControllerState::SwitchingDevice(pending) = &self.state {
            debug!(
                "{} device switch to '{}' superseded by '{}'",
                self.track_id, pending.device_id, device_id
            );
        }

        self.switch_generation += 1;
        self.state = ControllerState::SwitchingDevice(DeviceSwitch {
            device_id: device_id.to_string(),
            settle_at: now + self.config.settle_delay(),
            generation: self.switch_generation,
        });
        info!(
            "{} switching output to {}",
            self.track_id,
            if device_id.is_empty() { "default" } else { device_id }
        );
        let _ = self.events.send(Event::DeviceSwitchStarted {
            track_id: self.track_id,
            device_id: device_id.to_string(),
        });
    }

    /// Fire due deadlines: the device-switch settle and the drift indicator
    pub fn poll(&mut self, track: &AudioTrack, clock: MasterClock, now: Instant) {
        if let Some(until) = self.indicator_until {
            if now >= until {
                self.indicator_until = None;
                let _ = self.events.send(Event::DriftIndicatorCleared {
                    track_id: self.track_id,
                });
            }
        }

        let due = match &self.state {
            ControllerState::SwitchingDevice(switch) if now >= switch.settle_at => Some(switch.clone()),
            _ => None,
        };
        if let Some(switch) = due {
            self.settle(switch, track, clock);
        }
    }

    fn settle(&mut self, switch: DeviceSwitch, track: &AudioTrack, clock: MasterClock) {
        let mut resumed = false;

        if clock.is_playing {
            let raw_target = track.raw_target(clock.current_time);
            if let Some(handle) = self.handle.as_mut() {
                handle.seek(raw_target.max(0.0));
            }
            if raw_target >= 0.0 {
                resumed = self.try_play();
            } else {
                self.pause_handle();
                self.state = ControllerState::AwaitingStart;
            }
        } else {
            self.pause_handle();
            self.state = ControllerState::Paused;
        }

        debug!(
            "{} device switch #{} settled (resumed: {})",
            self.track_id, switch.generation, resumed
        );
        let _ = self.events.send(Event::DeviceSwitchSettled {
            track_id: self.track_id,
            device_id: switch.device_id,
            resumed,
        });
    }

    /// Applied immediately; independent of the state machine
    pub fn set_playback_rate(&mut self, rate: f64) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_playback_rate(rate);
        }
    }

    pub fn apply_volume(&mut self, volume: EffectiveVolume) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(volume.gain);
            handle.set_muted(volume.muted);
        }
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        let settle = match &self.state {
            ControllerState::SwitchingDevice(switch) => Some(switch.settle_at),
            _ => None,
        };
        match (settle, self.indicator_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Stop playback and cancel every pending deadline
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.pause();
        }
        if self.state.is_switching() {
            debug!("{} pending device switch cancelled", self.track_id);
        }
        self.state = ControllerState::Idle;
        self.indicator_until = None;
        self.last_correction = None;
    }

    fn start_or_arm(&mut self, track: &AudioTrack, clock: MasterClock) {
        if track.raw_target(clock.current_time) >= 0.0 {
            self.try_play();
        } else {
            self.pause_handle();
            self.state = ControllerState::AwaitingStart;
        }
    }

    /// Pause the element unless it is already paused
    fn pause_handle(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            if !handle.is_paused() {
                handle.pause();
            }
        }
    }

    /// Start playback; a host rejection leaves the track paused until the
    /// next master play edge
    fn try_play(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        match handle.play() {
            Ok(()) => {
                self.state = ControllerState::Playing;
                true
            }
            Err(e) => {
                warn!("{} audio play deferred: {}", self.track_id, e);
                self.state = ControllerState::Paused;
                let _ = self.events.send(Event::PlaybackDeferred {
                    track_id: self.track_id,
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

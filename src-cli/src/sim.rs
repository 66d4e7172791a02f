//! Simulated playback session
//!
//! Drives the engine with a virtual clock and in-memory media elements that
//! advance at their playback rate plus an optional skew, so drift
//! correction and device switching can be observed without a player.

use std::cell::RefCell;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Args;
use syncinema_core::{
    AppSettings, AudioDevice, ClockSignal, DeviceHost, EngineError, EngineResult, Event, MediaHost,
    MemoryPreferenceStore, OutputRouter, PlaybackHandle, ResourceId, SyncConfig, SyncEngine,
    TrackSource, TrackUpdate,
};
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Track as NAME or NAME:OFFSET (repeatable)
    #[arg(short, long = "track", default_value = "en.mp3:0")]
    tracks: Vec<String>,

    /// Session length in seconds of video time
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Clock ticks per second
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Fractional speed error of the simulated elements (0.05 = 5% fast)
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    skew: f64,

    /// Sync threshold in seconds
    #[arg(long, default_value_t = 0.3)]
    threshold: f64,

    /// Video time at which the first track switches output device
    #[arg(long)]
    switch_at: Option<f64>,

    /// Device the first track switches to
    #[arg(long, default_value = "sim-headphones")]
    device: String,

    /// Reject play requests the way a browser blocks autoplay
    #[arg(long)]
    block_autoplay: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

fn parse_track(spec: &str) -> Result<(TrackSource, f64)> {
    let (name, offset) = match spec.rsplit_once(':') {
        Some((name, offset)) => (name, offset.parse::<f64>()?),
        None => (spec, 0.0),
    };
    if name.is_empty() {
        bail!("Empty track name in '{}'", spec);
    }
    Ok((TrackSource::new(name, format!("sim://{}", name)), offset))
}

pub fn run(args: SimulateArgs) -> Result<()> {
    if args.fps == 0 || !(args.duration > 0.0) {
        bail!("fps and duration must be positive");
    }
    let tracks = args
        .tracks
        .iter()
        .map(|spec| parse_track(spec))
        .collect::<Result<Vec<_>>>()?;

    let host = SimHost::new();
    host.set_skew(args.skew);
    host.block_autoplay(args.block_autoplay);
    host.allow_sinks(&["sim-speakers", &args.device]);
    let settings = AppSettings {
        sync_threshold_secs: args.threshold,
        ..Default::default()
    };
    let mut engine = SyncEngine::new(
        SyncConfig::default(),
        Box::new(host.clone()),
        Arc::new(SimDeviceHost::new(&args.device)),
        Box::new(MemoryPreferenceStore::new()),
        settings,
    )?;

    let start = Instant::now();
    let dt = 1.0 / f64::from(args.fps);
    let at = |t: f64| start + Duration::from_secs_f64(t);

    engine.on_clock(ClockSignal::DurationChanged(args.duration), start);
    let sources: Vec<TrackSource> = tracks.iter().map(|(source, _)| source.clone()).collect();
    let ids = engine.add_tracks(&sources, start);
    for (id, (_, offset)) in ids.iter().zip(&tracks) {
        engine.update_track(*id, &TrackUpdate::default().offset(*offset), start)?;
    }
    info!("Simulating {} tracks for {:.1}s", ids.len(), args.duration);

    engine.on_clock(
        ClockSignal::PlayStateChanged {
            is_playing: true,
            current_time: 0.0,
        },
        start,
    );
    print_events(&engine, 0.0, args.json)?;

    let mut block = vec![0.0f32; 512];
    let mut phase = 0.0f32;
    let mut switched = false;
    let mut t = 0.0;

    while t < args.duration {
        t = (t + dt).min(args.duration);
        let now = at(t);
        host.advance(dt);

        if let (Some(switch_at), Some(first)) = (args.switch_at, ids.first()) {
            if !switched && t >= switch_at {
                engine.update_track(*first, &TrackUpdate::default().device_id(args.device.clone()), now)?;
                switched = true;
            }
        }

        engine.on_clock(ClockSignal::AnimationFrame(t), now);

        for id in &ids {
            for frame in block.chunks_mut(2) {
                let sample = (phase * TAU).sin() * 0.5;
                frame.fill(sample);
                phase = (phase + 440.0 / 48_000.0).fract();
            }
            engine.render(*id, &mut block);
        }

        print_events(&engine, t, args.json)?;
    }

    engine.on_clock(
        ClockSignal::PlayStateChanged {
            is_playing: false,
            current_time: t,
        },
        at(t),
    );
    print_events(&engine, t, args.json)?;

    println!();
    for id in &ids {
        let Some(track) = engine.track(*id) else {
            continue;
        };
        let position = host.position(track.resource).unwrap_or_default();
        println!(
            "{:<24} offset {:+.3}s  position {:.3}s  target {:.3}s  state {}  level {:.2}",
            track.name,
            track.offset,
            position,
            track.target_time(t),
            engine.controller_state(*id).map(|s| s.name()).unwrap_or("removed"),
            engine.track_level(*id).unwrap_or(0.0),
        );
    }
    Ok(())
}

fn print_events(engine: &SyncEngine, t: f64, json: bool) -> Result<()> {
    for event in engine.events() {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("[{:7.3}s] {}", t, describe(&event));
        }
    }
    Ok(())
}

fn describe(event: &Event) -> String {
    match event {
        Event::TrackAdded { track_id, name } => format!("{} added ({})", track_id, name),
        Event::TrackRemoved { track_id } => format!("{} removed", track_id),
        Event::DriftCorrected {
            track_id,
            drift,
            target,
        } => format!("{} drift {:.3}s, seeked to {:.3}s", track_id, drift, target),
        Event::DriftIndicatorCleared { track_id } => format!("{} back in sync", track_id),
        Event::DeviceSwitchStarted { track_id, device_id } => {
            format!("{} switching to '{}'", track_id, device_id)
        }
        Event::DeviceSwitchSettled {
            track_id,
            device_id,
            resumed,
        } => format!("{} settled on '{}' (resumed: {})", track_id, device_id, resumed),
        other => format!("{:?}", other),
    }
}

#[derive(Debug, Clone)]
struct SimElement {
    time: f64,
    paused: bool,
    rate: f64,
}

#[derive(Debug, Default)]
struct SimState {
    next_resource: u64,
    elements: HashMap<ResourceId, SimElement>,
    skew: f64,
    autoplay_blocked: bool,
    sinks: Vec<String>,
}

/// In-memory `MediaHost`; clones share the same elements
#[derive(Debug, Clone, Default)]
pub struct SimHost(Rc<RefCell<SimState>>);

impl SimHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_skew(&self, skew: f64) {
        self.0.borrow_mut().skew = skew;
    }

    pub fn block_autoplay(&self, blocked: bool) {
        self.0.borrow_mut().autoplay_blocked = blocked;
    }

    /// Device ids the routers accept besides the system default
    pub fn allow_sinks(&self, device_ids: &[&str]) {
        self.0.borrow_mut().sinks = device_ids.iter().map(|id| id.to_string()).collect();
    }

    /// Advance every playing element by `dt` seconds of wall time
    pub fn advance(&self, dt: f64) {
        let mut state = self.0.borrow_mut();
        let factor = 1.0 + state.skew;
        for element in state.elements.values_mut().filter(|e| !e.paused) {
            element.time += dt * element.rate * factor;
        }
    }

    pub fn position(&self, resource: ResourceId) -> Option<f64> {
        self.0.borrow().elements.get(&resource).map(|e| e.time)
    }
}

impl MediaHost for SimHost {
    fn allocate(&mut self, source: &TrackSource) -> EngineResult<ResourceId> {
        let mut state = self.0.borrow_mut();
        state.next_resource += 1;
        let resource = ResourceId(state.next_resource);
        state.elements.insert(
            resource,
            SimElement {
                time: 0.0,
                paused: true,
                rate: 1.0,
            },
        );
        debug!("{} allocated for {}", resource, source.location);
        Ok(resource)
    }

    fn release(&mut self, resource: ResourceId) {
        self.0.borrow_mut().elements.remove(&resource);
    }

    fn open_playback(&mut self, resource: ResourceId) -> EngineResult<Box<dyn PlaybackHandle>> {
        if !self.0.borrow().elements.contains_key(&resource) {
            return Err(EngineError::Playback(format!("{} not allocated", resource)));
        }
        Ok(Box::new(SimPlayback {
            host: Rc::clone(&self.0),
            resource,
        }))
    }

    fn open_router(&mut self, resource: ResourceId) -> EngineResult<Box<dyn OutputRouter>> {
        Ok(Box::new(SimRouter {
            host: Rc::clone(&self.0),
            resource,
        }))
    }
}

struct SimPlayback {
    host: Rc<RefCell<SimState>>,
    resource: ResourceId,
}

impl SimPlayback {
    fn with<R>(&self, f: impl FnOnce(&mut SimElement) -> R) -> Option<R> {
        self.host.borrow_mut().elements.get_mut(&self.resource).map(f)
    }
}

impl PlaybackHandle for SimPlayback {
    fn current_time(&self) -> f64 {
        self.with(|e| e.time).unwrap_or_default()
    }

    fn seek(&mut self, time: f64) {
        self.with(|e| e.time = time);
    }

    fn play(&mut self) -> EngineResult<()> {
        if self.host.borrow().autoplay_blocked {
            return Err(EngineError::PlayRejected(
                "play() can only be initiated by a user gesture".into(),
            ));
        }
        self.with(|e| e.paused = false)
            .ok_or_else(|| EngineError::Playback(format!("{} released", self.resource)))
    }

    fn pause(&mut self) {
        self.with(|e| e.paused = true);
    }

    fn is_paused(&self) -> bool {
        self.with(|e| e.paused).unwrap_or(true)
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.with(|e| e.rate = rate);
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn set_muted(&mut self, _muted: bool) {}
}

struct SimRouter {
    host: Rc<RefCell<SimState>>,
    resource: ResourceId,
}

impl OutputRouter for SimRouter {
    fn supports_sink_selection(&self) -> bool {
        true
    }

    fn set_sink(&mut self, device_id: &str) -> EngineResult<()> {
        let state = self.host.borrow();
        if !device_id.is_empty() && !state.sinks.iter().any(|id| id == device_id) {
            return Err(EngineError::SinkError(format!(
                "Requested device not found: {}",
                device_id
            )));
        }
        debug!("{} sink -> '{}'", self.resource, device_id);
        Ok(())
    }
}

/// Fixed device list: the system default plus one extra output
struct SimDeviceHost {
    devices: Vec<AudioDevice>,
}

impl SimDeviceHost {
    fn new(extra: &str) -> Self {
        Self {
            devices: vec![
                AudioDevice::output("sim-speakers", "Simulated Speakers"),
                AudioDevice::output(extra, "Simulated Output"),
            ],
        }
    }
}

impl DeviceHost for SimDeviceHost {
    fn request_label_permission(&self) -> EngineResult<()> {
        Ok(())
    }

    fn enumerate(&self) -> EngineResult<Vec<AudioDevice>> {
        Ok(self.devices.clone())
    }
}

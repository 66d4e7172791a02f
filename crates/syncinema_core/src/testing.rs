//! In-memory host fakes for unit tests

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::device::AudioDevice;
use crate::error::{EngineError, EngineResult};
use crate::host::{DeviceHost, MediaHost, OutputRouter, PlaybackHandle};
use crate::track::{ResourceId, TrackSource};

/// Observable state of one fake media element
#[derive(Debug, Clone)]
pub(crate) struct MediaState {
    pub time: f64,
    pub paused: bool,
    pub rate: f64,
    pub volume: f32,
    pub muted: bool,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub seeks: Vec<f64>,
    pub reject_play: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            time: 0.0,
            paused: true,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            play_calls: 0,
            pause_calls: 0,
            seeks: Vec::new(),
            reject_play: false,
        }
    }
}

/// Shared handle to a fake element; clones observe the same state
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeMedia(Rc<RefCell<MediaState>>);

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MediaState {
        self.0.borrow().clone()
    }

    /// Move the element's playhead without recording a seek
    pub fn set_time(&self, time: f64) {
        self.0.borrow_mut().time = time;
    }

    pub fn reject_play(&self, reject: bool) {
        self.0.borrow_mut().reject_play = reject;
    }
}

pub(crate) struct FakePlayback {
    media: FakeMedia,
}

impl FakePlayback {
    pub fn new(media: FakeMedia) -> Self {
        Self { media }
    }
}

impl PlaybackHandle for FakePlayback {
    fn current_time(&self) -> f64 {
        self.media.0.borrow().time
    }

    fn seek(&mut self, time: f64) {
        let mut state = self.media.0.borrow_mut();
        state.time = time;
        state.seeks.push(time);
    }

    fn play(&mut self) -> EngineResult<()> {
        let mut state = self.media.0.borrow_mut();
        state.play_calls += 1;
        if state.reject_play {
            return Err(EngineError::PlayRejected("NotAllowedError".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.media.0.borrow_mut();
        state.paused = true;
        state.pause_calls += 1;
    }

    fn is_paused(&self) -> bool {
        self.media.0.borrow().paused
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.media.0.borrow_mut().rate = rate;
    }

    fn set_volume(&mut self, volume: f32) {
        self.media.0.borrow_mut().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.media.0.borrow_mut().muted = muted;
    }
}

#[derive(Debug)]
struct HostState {
    next_resource: u64,
    media: HashMap<ResourceId, FakeMedia>,
    released: Vec<ResourceId>,
    router_opens: HashMap<ResourceId, usize>,
    sinks: HashMap<ResourceId, Vec<String>>,
    fail_names: Vec<String>,
    fail_router: bool,
    sink_supported: bool,
    reject_sink: bool,
}

/// Scriptable `MediaHost`; clones share state so tests can keep one
/// after handing another to the engine
#[derive(Debug, Clone)]
pub(crate) struct FakeHost(Rc<RefCell<HostState>>);

impl FakeHost {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(HostState {
            next_resource: 1,
            media: HashMap::new(),
            released: Vec::new(),
            router_opens: HashMap::new(),
            sinks: HashMap::new(),
            fail_names: Vec::new(),
            fail_router: false,
            sink_supported: true,
            reject_sink: false,
        })))
    }

    pub fn media(&self, resource: ResourceId) -> FakeMedia {
        self.0
            .borrow()
            .media
            .get(&resource)
            .cloned()
            .expect("unknown resource")
    }

    pub fn released(&self) -> Vec<ResourceId> {
        self.0.borrow().released.clone()
    }

    pub fn router_opens(&self, resource: ResourceId) -> usize {
        self.0.borrow().router_opens.get(&resource).copied().unwrap_or(0)
    }

    pub fn sinks(&self, resource: ResourceId) -> Vec<String> {
        self.0.borrow().sinks.get(&resource).cloned().unwrap_or_default()
    }

    /// Make allocation fail for sources with this name
    pub fn fail_allocation(&self, name: &str) {
        self.0.borrow_mut().fail_names.push(name.to_string());
    }

    pub fn fail_router(&self, fail: bool) {
        self.0.borrow_mut().fail_router = fail;
    }

    pub fn set_sink_supported(&self, supported: bool) {
        self.0.borrow_mut().sink_supported = supported;
    }

    pub fn reject_sink(&self, reject: bool) {
        self.0.borrow_mut().reject_sink = reject;
    }
}

impl MediaHost for FakeHost {
    fn allocate(&mut self, source: &TrackSource) -> EngineResult<ResourceId> {
        let mut state = self.0.borrow_mut();
        if state.fail_names.contains(&source.name) {
            return Err(EngineError::Playback(format!("cannot open {}", source.location)));
        }
        let resource = ResourceId(state.next_resource);
        state.next_resource += 1;
        state.media.insert(resource, FakeMedia::new());
        Ok(resource)
    }

    fn release(&mut self, resource: ResourceId) {
        let mut state = self.0.borrow_mut();
        if state.media.remove(&resource).is_some() {
            state.released.push(resource);
        }
    }

    fn open_playback(&mut self, resource: ResourceId) -> EngineResult<Box<dyn PlaybackHandle>> {
        let state = self.0.borrow();
        let media = state
            .media
            .get(&resource)
            .cloned()
            .ok_or_else(|| EngineError::Playback(format!("{} not allocated", resource)))?;
        Ok(Box::new(FakePlayback::new(media)))
    }

    fn open_router(&mut self, resource: ResourceId) -> EngineResult<Box<dyn OutputRouter>> {
        let mut state = self.0.borrow_mut();
        *state.router_opens.entry(resource).or_insert(0) += 1;
        if state.fail_router {
            return Err(EngineError::Playback("audio context unavailable".into()));
        }
        Ok(Box::new(FakeRouter {
            host: Rc::clone(&self.0),
            resource,
        }))
    }
}

struct FakeRouter {
    host: Rc<RefCell<HostState>>,
    resource: ResourceId,
}

impl OutputRouter for FakeRouter {
    fn supports_sink_selection(&self) -> bool {
        self.host.borrow().sink_supported
    }

    fn set_sink(&mut self, device_id: &str) -> EngineResult<()> {
        let mut state = self.host.borrow_mut();
        if state.reject_sink {
            return Err(EngineError::SinkError(format!("{} unavailable", device_id)));
        }
        state
            .sinks
            .entry(self.resource)
            .or_default()
            .push(device_id.to_string());
        Ok(())
    }
}

/// Scripted device host with a manual hot-plug trigger
pub(crate) struct FakeDeviceHost {
    devices: Mutex<Vec<AudioDevice>>,
    deny_permission: AtomicBool,
    permission_requests: AtomicUsize,
    change_tx: Sender<()>,
    change_rx: Receiver<()>,
}

impl FakeDeviceHost {
    pub fn new(devices: Vec<AudioDevice>) -> Self {
        let (change_tx, change_rx) = unbounded();
        Self {
            devices: Mutex::new(devices),
            deny_permission: AtomicBool::new(false),
            permission_requests: AtomicUsize::new(0),
            change_tx,
            change_rx,
        }
    }

    pub fn set_devices(&self, devices: Vec<AudioDevice>) {
        *self.devices.lock() = devices;
    }

    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn notify_change(&self) {
        let _ = self.change_tx.send(());
    }
}

impl DeviceHost for FakeDeviceHost {
    fn request_label_permission(&self) -> EngineResult<()> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_permission.load(Ordering::SeqCst) {
            Err(EngineError::PermissionDenied("NotAllowedError".into()))
        } else {
            Ok(())
        }
    }

    fn enumerate(&self) -> EngineResult<Vec<AudioDevice>> {
        Ok(self.devices.lock().clone())
    }

    fn change_notifications(&self) -> Option<Receiver<()>> {
        Some(self.change_rx.clone())
    }
}

//! Host Media Traits
//!
//! The engine never decodes or renders audio itself. These traits define
//! what it needs from the host media subsystem: playable elements, output
//! routing per chain, resource allocation and device enumeration.

use crossbeam_channel::Receiver;

use crate::device::AudioDevice;
use crate::error::EngineResult;
use crate::track::{ResourceId, TrackSource};

/// One playable media element bound to a track's resource
pub trait PlaybackHandle {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Hard-seek to a position in seconds
    fn seek(&mut self, time: f64);

    /// Start playback
    ///
    /// May be rejected by the host (autoplay policy); the caller decides
    /// whether that matters.
    fn play(&mut self) -> EngineResult<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn set_playback_rate(&mut self, rate: f64);

    /// Element volume, 0.0 to 1.0
    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);
}

/// Output routing for one signal chain
pub trait OutputRouter {
    /// Whether the host can route this chain to a chosen device
    fn supports_sink_selection(&self) -> bool;

    /// Retarget output; an empty id selects the system default
    fn set_sink(&mut self, device_id: &str) -> EngineResult<()>;
}

/// Allocates playable resources and the objects bound to them
pub trait MediaHost {
    /// Register a source and return a handle that stays valid until `release`
    fn allocate(&mut self, source: &TrackSource) -> EngineResult<ResourceId>;

    /// Free a resource; must tolerate unknown or already-released ids
    fn release(&mut self, resource: ResourceId);

    fn open_playback(&mut self, resource: ResourceId) -> EngineResult<Box<dyn PlaybackHandle>>;

    /// Bind a processing graph to the resource
    ///
    /// Hosts bind the graph's source to its element exactly once; the engine
    /// guarantees this is never called twice for one resource.
    fn open_router(&mut self, resource: ResourceId) -> EngineResult<Box<dyn OutputRouter>>;
}

/// Output device enumeration
pub trait DeviceHost: Send + Sync {
    /// One-time gesture that unlocks human-readable device labels
    ///
    /// Implementations must not keep any capture stream open afterwards.
    fn request_label_permission(&self) -> EngineResult<()>;

    /// List every audio device currently visible to the host
    fn enumerate(&self) -> EngineResult<Vec<AudioDevice>>;

    /// Hot-plug notifications, if the host can deliver them
    fn change_notifications(&self) -> Option<Receiver<()>> {
        None
    }
}

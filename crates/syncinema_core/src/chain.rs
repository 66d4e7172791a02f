//! Per-Track Signal Chain
//!
//! Fixed topology, built once per playback resource:
//!
//! ```text
//! source ─▶ lowShelf(320Hz) ─▶ peaking(1kHz, Q 0.5) ─▶ highShelf(3.2kHz) ─▶ compressor ─▶ sink
//!                                                                               │
//!                                                                         level meter tap
//! ```
//!
//! Only parameters (gains, compressor preset, sink id) change after
//! construction. The host binds a graph's source to its element exactly
//! once, so `SignalGraph` refuses to build a second chain for a resource,
//! even after the first was detached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use syncinema_dsp::{
    AudioProcessor, Compressor, CompressorSettings, EqGains, LevelMeter, ProcessContext, ThreeBandEq,
};
use tracing::{debug, error, info, warn};

use crate::error::EngineResult;
use crate::host::{MediaHost, OutputRouter};
use crate::track::{AudioTrack, ResourceId};

/// Outcome of a sink change that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkRouting {
    Routed,
    /// Host cannot route per chain; output stays on the current device
    Unsupported,
}

pub struct SignalChain {
    resource: ResourceId,
    eq: ThreeBandEq,
    compressor: Compressor,
    meter: Arc<LevelMeter>,
    router: Box<dyn OutputRouter>,
    sink_id: String,
    context: ProcessContext,
}

impl SignalChain {
    /// Build the chain with the track's current EQ and compressor settings
    pub fn build(
        resource: ResourceId,
        router: Box<dyn OutputRouter>,
        track: &AudioTrack,
        sample_rate: u32,
    ) -> EngineResult<Self> {
        let sample_rate = sample_rate as f32;
        let mut eq = ThreeBandEq::new(sample_rate)?;
        eq.set_gains(track.eq)?;
        let compressor = Compressor::new(sample_rate, CompressorSettings::for_toggle(track.use_compressor));

        Ok(Self {
            resource,
            eq,
            compressor,
            meter: Arc::new(LevelMeter::new()),
            router,
            sink_id: String::new(),
            context: ProcessContext::new(sample_rate, 2),
        })
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Write all three band gains at once
    pub fn set_eq(&mut self, gains: EqGains) -> EngineResult<()> {
        self.eq.set_gains(gains)?;
        debug!("{} EQ set to {:?}", self.resource, self.eq.gains());
        Ok(())
    }

    pub fn eq_gains(&self) -> EqGains {
        self.eq.gains()
    }

    pub fn set_compressor(&mut self, enabled: bool) {
        self.compressor.set_enabled(enabled);
        debug!("{} compressor {}", self.resource, if enabled { "on" } else { "off" });
    }

    pub fn compressor_settings(&self) -> &CompressorSettings {
        self.compressor.settings()
    }

    /// Retarget output; an empty id selects the system default
    ///
    /// An unsupported host is not an error: the warning is logged and the
    /// call succeeds with `SinkRouting::Unsupported`.
    pub fn set_sink(&mut self, device_id: &str) -> EngineResult<SinkRouting> {
        if !self.router.supports_sink_selection() {
            warn!("{} output device selection not supported by host", self.resource);
            return Ok(SinkRouting::Unsupported);
        }

        self.router.set_sink(device_id)?;
        self.sink_id = device_id.to_string();
        info!(
            "{} output routed to {}",
            self.resource,
            if device_id.is_empty() { "default" } else { device_id }
        );
        Ok(SinkRouting::Routed)
    }

    /// Device the chain currently outputs to ("" = system default)
    pub fn sink_id(&self) -> &str {
        &self.sink_id
    }

    /// Run one interleaved stereo block through EQ and compressor, then
    /// feed the meter tap
    pub fn process(&mut self, buffer: &mut [f32]) {
        self.eq.process(buffer, &self.context);
        self.compressor.process(buffer, &self.context);
        self.meter.push_interleaved(buffer);
    }

    pub fn meter(&self) -> Arc<LevelMeter> {
        Arc::clone(&self.meter)
    }

    pub fn reset(&mut self) {
        self.eq.reset();
        self.compressor.reset();
        self.meter.reset();
    }
}

/// All chains, keyed by the playback resource they are bound to
pub struct SignalGraph {
    chains: HashMap<ResourceId, SignalChain>,
    bound: HashSet<ResourceId>,
    sample_rate: u32,
}

impl SignalGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            chains: HashMap::new(),
            bound: HashSet::new(),
            sample_rate,
        }
    }

    /// Build the chain for a track's resource and route it to the track's
    /// device
    ///
    /// Idempotent: an already-bound resource is left untouched and `Ok`
    /// is returned. A failure only affects this track.
    pub fn attach(&mut self, host: &mut dyn MediaHost, track: &AudioTrack, sink_id: &str) -> EngineResult<()> {
        if self.bound.contains(&track.resource) {
            debug!("{} already has a signal chain", track.resource);
            return Ok(());
        }

        let router = host.open_router(track.resource)?;
        // The source is now bound, whether or not the rest succeeds
        self.bound.insert(track.resource);

        let mut chain = SignalChain::build(track.resource, router, track, self.sample_rate)?;
        if let Err(e) = chain.set_sink(sink_id) {
            error!("{} initial output device failed: {}", track.id, e);
        }

        info!("{} audio graph initialized", track.resource);
        self.chains.insert(track.resource, chain);
        Ok(())
    }

    pub fn is_bound(&self, resource: ResourceId) -> bool {
        self.bound.contains(&resource)
    }

    pub fn get(&self, resource: ResourceId) -> Option<&SignalChain> {
        self.chains.get(&resource)
    }

    pub fn get_mut(&mut self, resource: ResourceId) -> Option<&mut SignalChain> {
        self.chains.get_mut(&resource)
    }

    /// Drop the chain; the resource stays marked as bound
    pub fn detach(&mut self, resource: ResourceId) -> Option<SignalChain> {
        self.chains.remove(&resource)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use crate::track::{TrackId, TrackPrefs, TrackSource};

    fn track_on(host: &mut FakeHost, prefs: TrackPrefs) -> AudioTrack {
        let resource = host.allocate(&TrackSource::new("en.mp3", "/tmp/en.mp3")).unwrap();
        AudioTrack::new(TrackId::new(1), "en.mp3".into(), resource, prefs)
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut host = FakeHost::new();
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);

        graph.attach(&mut host, &track, "").unwrap();
        graph.attach(&mut host, &track, "").unwrap();

        assert_eq!(host.router_opens(track.resource), 1);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_detached_resource_is_never_rebound() {
        let mut host = FakeHost::new();
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);

        graph.attach(&mut host, &track, "").unwrap();
        assert!(graph.detach(track.resource).is_some());
        graph.attach(&mut host, &track, "").unwrap();

        assert_eq!(host.router_opens(track.resource), 1);
        assert!(graph.is_empty());
        assert!(graph.is_bound(track.resource));
    }

    #[test]
    fn test_initial_settings_from_track() {
        let mut host = FakeHost::new();
        let track = track_on(
            &mut host,
            TrackPrefs {
                eq: EqGains::new(3.0, 0.0, 2.0),
                use_compressor: true,
                device_id: "hp-1".into(),
                ..Default::default()
            },
        );
        let mut graph = SignalGraph::new(48000);
        graph.attach(&mut host, &track, "hp-1").unwrap();

        let chain = graph.get(track.resource).unwrap();
        assert_eq!(chain.eq_gains(), EqGains::new(3.0, 0.0, 2.0));
        assert_eq!(chain.compressor_settings(), &CompressorSettings::enabled());
        assert_eq!(chain.sink_id(), "hp-1");
        assert_eq!(host.sinks(track.resource), vec!["hp-1".to_string()]);
    }

    #[test]
    fn test_compressor_toggle() {
        let mut host = FakeHost::new();
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);
        graph.attach(&mut host, &track, "").unwrap();

        let chain = graph.get_mut(track.resource).unwrap();
        assert_eq!(chain.compressor_settings(), &CompressorSettings::bypass());
        chain.set_compressor(true);
        assert_eq!(chain.compressor_settings().ratio, 12.0);
        chain.set_compressor(false);
        assert_eq!(chain.compressor_settings().ratio, 1.0);
    }

    #[test]
    fn test_unsupported_sink_is_not_an_error() {
        let mut host = FakeHost::new();
        host.set_sink_supported(false);
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);
        graph.attach(&mut host, &track, "").unwrap();

        let chain = graph.get_mut(track.resource).unwrap();
        assert_eq!(chain.set_sink("hp-1").unwrap(), SinkRouting::Unsupported);
        assert_eq!(chain.sink_id(), "");
    }

    #[test]
    fn test_rejected_sink_reports_error() {
        let mut host = FakeHost::new();
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);
        graph.attach(&mut host, &track, "").unwrap();

        host.reject_sink(true);
        let chain = graph.get_mut(track.resource).unwrap();
        assert!(chain.set_sink("hp-1").is_err());
        assert_eq!(chain.sink_id(), "");
    }

    #[test]
    fn test_router_failure_isolated() {
        let mut host = FakeHost::new();
        let a = track_on(&mut host, TrackPrefs::default());
        let b = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);

        host.fail_router(true);
        assert!(graph.attach(&mut host, &a, "").is_err());
        host.fail_router(false);
        graph.attach(&mut host, &b, "").unwrap();

        assert!(graph.get(a.resource).is_none());
        assert!(graph.get(b.resource).is_some());
    }

    #[test]
    fn test_process_feeds_meter() {
        let mut host = FakeHost::new();
        let track = track_on(&mut host, TrackPrefs::default());
        let mut graph = SignalGraph::new(48000);
        graph.attach(&mut host, &track, "").unwrap();

        let chain = graph.get_mut(track.resource).unwrap();
        let mut buffer: Vec<f32> = (0..1024)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        chain.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
        assert!(chain.meter().update() > 0.0);
    }
}

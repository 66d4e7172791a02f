//! Sync engine benchmarks
//!
//! Measures the per-tick cost of drift checking and the per-block cost of
//! rendering through the track chains.

use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use syncinema_core::{
    AppSettings, AudioDevice, ClockSignal, DeviceHost, EngineResult, MediaHost,
    MemoryPreferenceStore, OutputRouter, PlaybackHandle, ResourceId, SyncConfig, SyncEngine,
    TrackSource,
};

/// Elements that report exactly the position they were last seeked to
struct StillHost {
    next: u64,
}

struct StillPlayback {
    time: f64,
    paused: bool,
}

impl PlaybackHandle for StillPlayback {
    fn current_time(&self) -> f64 {
        self.time
    }
    fn seek(&mut self, time: f64) {
        self.time = time;
    }
    fn play(&mut self) -> EngineResult<()> {
        self.paused = false;
        Ok(())
    }
    fn pause(&mut self) {
        self.paused = true;
    }
    fn is_paused(&self) -> bool {
        self.paused
    }
    fn set_playback_rate(&mut self, _rate: f64) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn set_muted(&mut self, _muted: bool) {}
}

struct NullRouter;

impl OutputRouter for NullRouter {
    fn supports_sink_selection(&self) -> bool {
        true
    }
    fn set_sink(&mut self, _device_id: &str) -> EngineResult<()> {
        Ok(())
    }
}

impl MediaHost for StillHost {
    fn allocate(&mut self, _source: &TrackSource) -> EngineResult<ResourceId> {
        self.next += 1;
        Ok(ResourceId(self.next))
    }
    fn release(&mut self, _resource: ResourceId) {}
    fn open_playback(&mut self, _resource: ResourceId) -> EngineResult<Box<dyn PlaybackHandle>> {
        Ok(Box::new(StillPlayback {
            time: 0.0,
            paused: true,
        }))
    }
    fn open_router(&mut self, _resource: ResourceId) -> EngineResult<Box<dyn OutputRouter>> {
        Ok(Box::new(NullRouter))
    }
}

struct OneDevice;

impl DeviceHost for OneDevice {
    fn request_label_permission(&self) -> EngineResult<()> {
        Ok(())
    }
    fn enumerate(&self) -> EngineResult<Vec<AudioDevice>> {
        Ok(vec![AudioDevice::output("speakers", "Speakers")])
    }
}

fn engine_with_tracks(count: usize) -> SyncEngine {
    let mut engine = SyncEngine::new(
        SyncConfig::default(),
        Box::new(StillHost { next: 0 }),
        Arc::new(OneDevice),
        Box::new(MemoryPreferenceStore::new()),
        AppSettings::default(),
    )
    .unwrap();
    let sources: Vec<TrackSource> = (0..count)
        .map(|i| TrackSource::new(format!("track-{}.mp3", i), format!("/media/{}", i)))
        .collect();
    let now = Instant::now();
    engine.add_tracks(&sources, now);
    engine.on_clock(
        ClockSignal::PlayStateChanged {
            is_playing: true,
            current_time: 0.0,
        },
        now,
    );
    engine
}

fn benchmark_clock_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_tick");

    for tracks in [1, 4, 16] {
        let mut engine = engine_with_tracks(tracks);
        let start = Instant::now();
        let mut frame = 0u64;

        group.throughput(Throughput::Elements(tracks as u64));
        group.bench_function(format!("animation_frame_{}_tracks", tracks), |b| {
            b.iter(|| {
                frame += 1;
                let t = frame as f64 / 60.0;
                engine.on_clock(
                    black_box(ClockSignal::AnimationFrame(t)),
                    start + Duration::from_secs_f64(t),
                );
                engine.events();
            })
        });
    }

    group.finish();
}

fn benchmark_render(c: &mut Criterion) {
    let mut engine = engine_with_tracks(1);
    let id = engine.tracks()[0].id;
    let mut buffer: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.001).sin()).collect();

    c.bench_function("render_512_frames", |b| {
        b.iter(|| {
            engine.render(id, black_box(&mut buffer));
        })
    });
}

criterion_group!(benches, benchmark_clock_tick, benchmark_render);
criterion_main!(benches);

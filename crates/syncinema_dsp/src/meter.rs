//! FFT Level Meter (VU)
//!
//! A read-only analysis tap placed at the end of a track's chain. It mirrors
//! the behaviour of a browser `AnalyserNode` with `fftSize = 256` so the
//! meter reads the same as the web player:
//!
//! 1. Blackman-windowed FFT over the most recent 256 mono samples
//! 2. Magnitudes smoothed over time (time constant 0.8)
//! 3. Magnitudes converted to dB and byte-scaled over -100dB..-30dB
//! 4. Level = RMS of the byte bins / 128, clamped to 1.0
//!
//! The render side pushes samples; the UI side calls `update()` once per
//! frame. Both sides may live on different threads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Analysis window length (must be power of 2)
pub const METER_FFT_SIZE: usize = 256;

/// Number of frequency bins produced per analysis
const BIN_COUNT: usize = METER_FFT_SIZE / 2;

/// Byte scaling range, in dB
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Temporal smoothing between successive analyses
const SMOOTHING: f32 = 0.8;

/// Blackman window coefficient
fn blackman(n: usize, size: usize) -> f32 {
    let x = 2.0 * std::f32::consts::PI * n as f32 / size as f32;
    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}

struct SampleRing {
    samples: [f32; METER_FFT_SIZE],
    write_pos: usize,
}

struct Analysis {
    smoothed: [f32; BIN_COUNT],
    scratch: Vec<Complex<f32>>,
}

/// Per-track VU meter
pub struct LevelMeter {
    ring: Mutex<SampleRing>,
    analysis: Mutex<Analysis>,
    window: [f32; METER_FFT_SIZE],
    fft: Arc<dyn Fft<f32>>,
    /// Last computed level, stored as f32 bits
    level_bits: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(METER_FFT_SIZE);

        Self {
            ring: Mutex::new(SampleRing {
                samples: [0.0; METER_FFT_SIZE],
                write_pos: 0,
            }),
            analysis: Mutex::new(Analysis {
                smoothed: [0.0; BIN_COUNT],
                scratch: vec![Complex::new(0.0, 0.0); METER_FFT_SIZE],
            }),
            window: core::array::from_fn(|i| blackman(i, METER_FFT_SIZE)),
            fft,
            level_bits: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    /// Push a stereo sample pair (mixed to mono)
    #[inline]
    pub fn push_sample(&self, left: f32, right: f32) {
        let mut ring = self.ring.lock();
        let pos = ring.write_pos;
        ring.samples[pos] = (left + right) * 0.5;
        ring.write_pos = (pos + 1) % METER_FFT_SIZE;
    }

    /// Push an interleaved stereo buffer
    pub fn push_interleaved(&self, buffer: &[f32]) {
        let mut ring = self.ring.lock();
        for frame in buffer.chunks_exact(2) {
            let pos = ring.write_pos;
            ring.samples[pos] = (frame[0] + frame[1]) * 0.5;
            ring.write_pos = (pos + 1) % METER_FFT_SIZE;
        }
    }

    /// Run one analysis pass and return the new level (0.0 to 1.0)
    ///
    /// Call this from the UI side at the display frame rate.
    pub fn update(&self) -> f32 {
        let mut analysis = self.analysis.lock();

        {
            let ring = self.ring.lock();
            // Oldest sample first
            for i in 0..METER_FFT_SIZE {
                let sample = ring.samples[(ring.write_pos + i) % METER_FFT_SIZE];
                analysis.scratch[i] = Complex::new(sample * self.window[i], 0.0);
            }
        }

        let Analysis { smoothed, scratch } = &mut *analysis;
        self.fft.process(scratch);

        let mut sum_squares = 0.0_f32;
        for (bin, value) in smoothed.iter_mut().zip(scratch.iter()) {
            let magnitude = value.norm() / METER_FFT_SIZE as f32;
            *bin = SMOOTHING * *bin + (1.0 - SMOOTHING) * magnitude;

            let byte = byte_scale(*bin) as f32;
            sum_squares += byte * byte;
        }

        let rms = (sum_squares / BIN_COUNT as f32).sqrt();
        let level = (rms / 128.0).min(1.0);
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
        level
    }

    /// Last computed level without running a new analysis
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Clear samples, smoothing history and the stored level
    pub fn reset(&self) {
        {
            let mut ring = self.ring.lock();
            ring.samples = [0.0; METER_FFT_SIZE];
            ring.write_pos = 0;
        }
        self.analysis.lock().smoothed = [0.0; BIN_COUNT];
        self.level_bits.store(0.0_f32.to_bits(), Ordering::Relaxed);
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a linear magnitude onto 0..=255 over the MIN_DB..MAX_DB range
#[inline]
fn byte_scale(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(1e-10).log10();
    let scaled = 255.0 / (MAX_DB - MIN_DB) * (db - MIN_DB);
    scaled.clamp(0.0, 255.0) as u8
}

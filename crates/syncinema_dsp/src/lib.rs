//! SynCinema DSP - Digital Signal Processing Module
//!
//! This crate provides the per-track audio processing stages for SynCinema:
//! - 3-band tone control (low shelf, mid peaking, high shelf) using BiQuad filters
//! - Dynamic range compressor with soft knee and attack/release smoothing
//! - Named EQ presets with exact-match lookup
//! - FFT level meter (VU) tap for visualization
//!
//! # Architecture
//!
//! The processing order is fixed: `EQ -> Compressor -> Output`.
//! Parameters are updated between buffer processing calls; the
//! processing path itself never allocates.

mod compressor;
mod eq;
mod error;
mod meter;
mod presets;
mod processor;

pub use compressor::{Compressor, CompressorSettings};
pub use eq::{
    Band, BandType, EqGains, ThreeBandEq, HIGH_SHELF_HZ, LOW_SHELF_HZ, MAX_GAIN_DB, PEAKING_HZ,
    PEAKING_Q,
};
pub use error::DspError;
pub use meter::{LevelMeter, METER_FFT_SIZE};
pub use presets::{match_preset, preset_by_id, EqPreset, PRESETS};
pub use processor::{AudioProcessor, ProcessContext};

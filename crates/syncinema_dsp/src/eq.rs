//! 3-Band Tone Control
//!
//! Implements a cascade of three BiQuad filters: a low shelf, a mid peaking
//! band and a high shelf. Based on the RBJ (Robert Bristow-Johnson) Audio EQ
//! Cookbook, matching the corner frequencies of the player's tone controls.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};
use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Low shelf corner frequency (Hz)
pub const LOW_SHELF_HZ: f32 = 320.0;

/// Mid peaking band center frequency (Hz)
pub const PEAKING_HZ: f32 = 1000.0;

/// Mid peaking band quality factor (wide, musical bell)
pub const PEAKING_Q: f32 = 0.5;

/// High shelf corner frequency (Hz)
pub const HIGH_SHELF_HZ: f32 = 3200.0;

/// Maximum boost/cut per band in dB
pub const MAX_GAIN_DB: f32 = 12.0;

/// Filter type for each EQ band
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandType {
    LowShelf,
    Peaking,
    HighShelf,
}

/// Gains of the three tone bands, in dB
///
/// This is the shape persisted per track and exchanged with the shell
/// (`{ "low": 3, "mid": 0, "high": 2 }`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqGains {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqGains {
    pub const FLAT: EqGains = EqGains {
        low: 0.0,
        mid: 0.0,
        high: 0.0,
    };

    pub const fn new(low: f32, mid: f32, high: f32) -> Self {
        Self { low, mid, high }
    }

    /// Clamp every band into `[-MAX_GAIN_DB, MAX_GAIN_DB]`; non-finite
    /// gains become flat
    pub fn clamped(self) -> Self {
        Self {
            low: clamp_gain(self.low),
            mid: clamp_gain(self.mid),
            high: clamp_gain(self.high),
        }
    }

    /// Gains in band order (low, mid, high)
    pub fn as_array(&self) -> [f32; 3] {
        [self.low, self.mid, self.high]
    }

    pub fn is_flat(&self) -> bool {
        *self == Self::FLAT
    }
}

/// Single EQ band configuration
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
    pub band_type: BandType,
}

impl Band {
    pub fn new(frequency: f32, band_type: BandType, q: f32) -> Self {
        Self {
            frequency,
            gain_db: 0.0,
            q,
            band_type,
        }
    }

    /// Generate BiQuad coefficients for this band
    ///
    /// The biquad crate takes shelf/peaking gain directly in dB.
    fn to_coefficients(self, sample_rate: f32) -> Result<Coefficients<f32>, DspError> {
        let freq = self.frequency.hz();
        let fs = sample_rate.hz();

        let filter = match self.band_type {
            BandType::LowShelf => Type::LowShelf(self.gain_db),
            BandType::Peaking => Type::PeakingEQ(self.gain_db),
            BandType::HighShelf => Type::HighShelf(self.gain_db),
        };

        Coefficients::<f32>::from_params(filter, fs, freq, self.q).map_err(|_| {
            DspError::InvalidCoefficients {
                frequency: self.frequency,
                sample_rate,
            }
        })
    }
}

/// The fixed band layout: low shelf, mid peaking, high shelf
fn default_bands() -> [Band; 3] {
    [
        Band::new(LOW_SHELF_HZ, BandType::LowShelf, Q_BUTTERWORTH_F32),
        Band::new(PEAKING_HZ, BandType::Peaking, PEAKING_Q),
        Band::new(HIGH_SHELF_HZ, BandType::HighShelf, Q_BUTTERWORTH_F32),
    ]
}

/// Stereo 3-band equalizer
///
/// Holds the filter state and processes audio samples.
/// Designed for real-time use: no allocations in `process_*()`.
/// At 0dB on every band the cascade is transparent.
pub struct ThreeBandEq {
    filters_left: [DirectForm2Transposed<f32>; 3],
    filters_right: [DirectForm2Transposed<f32>; 3],
    bands: [Band; 3],
    sample_rate: f32,
}

impl ThreeBandEq {
    /// Create a new equalizer with flat response
    ///
    /// Fails if the sample rate cannot host the high shelf corner
    /// (the corner must sit below Nyquist).
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }

        let bands = default_bands();
        let mut coeffs = Vec::with_capacity(3);
        for band in &bands {
            coeffs.push(band.to_coefficients(sample_rate)?);
        }

        Ok(Self {
            filters_left: core::array::from_fn(|i| DirectForm2Transposed::<f32>::new(coeffs[i])),
            filters_right: core::array::from_fn(|i| DirectForm2Transposed::<f32>::new(coeffs[i])),
            bands,
            sample_rate,
        })
    }

    /// Set all three band gains at once (clamped to ±12dB)
    ///
    /// Call this between buffer processing, not during.
    pub fn set_gains(&mut self, gains: EqGains) -> Result<(), DspError> {
        for (index, gain_db) in gains.as_array().into_iter().enumerate() {
            self.set_band_gain(index, gain_db)?;
        }
        Ok(())
    }

    /// Set gain for a single band (0 = low, 1 = mid, 2 = high)
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        let band = self
            .bands
            .get_mut(band_index)
            .ok_or(DspError::InvalidBandIndex(band_index))?;
        band.gain_db = clamp_gain(gain_db);

        let coeffs = band.to_coefficients(self.sample_rate)?;
        self.filters_left[band_index].update_coefficients(coeffs);
        self.filters_right[band_index].update_coefficients(coeffs);
        Ok(())
    }

    /// Current band gains (for UI state sync)
    pub fn gains(&self) -> EqGains {
        EqGains {
            low: self.bands[0].gain_db,
            mid: self.bands[1].gain_db,
            high: self.bands[2].gain_db,
        }
    }

    pub fn bands(&self) -> &[Band; 3] {
        &self.bands
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Process a stereo sample pair through the EQ cascade
    #[inline]
    pub fn process_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut l = left;
        let mut r = right;
        for i in 0..3 {
            l = self.filters_left[i].run(l);
            r = self.filters_right[i].run(r);
        }
        (l, r)
    }

    /// Process an interleaved stereo buffer in-place
    ///
    /// Buffer format: [L0, R0, L1, R1, L2, R2, ...]
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_sample(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Reset filter state (clear delay lines)
    pub fn reset(&mut self) {
        for i in 0..3 {
            self.filters_left[i].reset_state();
            self.filters_right[i].reset_state();
        }
    }
}

fn clamp_gain(gain_db: f32) -> f32 {
    if gain_db.is_finite() {
        gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
    } else {
        0.0
    }
}

//! Dynamic Range Compressor
//!
//! Feed-forward compressor with a soft knee, modelled on the browser
//! `DynamicsCompressorNode` parameter set so saved presets sound the same.
//!
//! # Algorithm
//!
//! - Detector: stereo-linked peak level converted to dB
//! - Gain computer: soft-knee static curve (threshold, knee width, ratio)
//! - Smoothing: one-pole attack/release on the gain reduction in dB
//!
//! With `ratio == 1` the static curve is the identity, so the stage is
//! transparent regardless of threshold and knee.

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Level above which compression begins (dBFS)
    pub threshold_db: f32,
    /// Width of the soft knee centred on the threshold (dB)
    pub knee_db: f32,
    /// Input/output slope above the knee (12.0 = 12:1)
    pub ratio: f32,
    /// Time to apply gain reduction (seconds)
    pub attack_secs: f32,
    /// Time to release gain reduction (seconds)
    pub release_secs: f32,
}

impl CompressorSettings {
    /// Preset used when a track has the compressor switched on
    pub const fn enabled() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }

    /// Preset used when the compressor is switched off (1:1, transparent)
    pub const fn bypass() -> Self {
        Self {
            threshold_db: 0.0,
            ratio: 1.0,
            ..Self::enabled()
        }
    }

    pub fn for_toggle(enabled: bool) -> Self {
        if enabled {
            Self::enabled()
        } else {
            Self::bypass()
        }
    }

    /// Static input -> output curve, both in dB
    #[inline]
    pub fn output_db(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        let half_knee = self.knee_db * 0.5;

        if over <= -half_knee {
            input_db
        } else if self.knee_db > 0.0 && over < half_knee {
            // Quadratic interpolation through the knee
            let x = over + half_knee;
            input_db + (1.0 / self.ratio - 1.0) * x * x / (2.0 * self.knee_db)
        } else {
            self.threshold_db + over / self.ratio
        }
    }
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self::bypass()
    }
}

/// Stereo-linked compressor
pub struct Compressor {
    settings: CompressorSettings,
    sample_rate: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (always <= 0)
    reduction_db: f32,
}

/// Floor for the level detector so silence does not produce -inf
const DETECTOR_FLOOR: f32 = 1e-9;

impl Compressor {
    pub fn new(sample_rate: f32, settings: CompressorSettings) -> Self {
        let mut compressor = Self {
            settings,
            sample_rate,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            reduction_db: 0.0,
        };
        compressor.recalculate_coefficients();
        compressor
    }

    pub fn set_settings(&mut self, settings: CompressorSettings) {
        self.settings = settings;
        self.recalculate_coefficients();
    }

    /// Switch between the enabled preset and the transparent preset
    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_settings(CompressorSettings::for_toggle(enabled));
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Current gain reduction in dB (0.0 = no reduction)
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    fn recalculate_coefficients(&mut self) {
        self.attack_coeff = time_coefficient(self.settings.attack_secs, self.sample_rate);
        self.release_coeff = time_coefficient(self.settings.release_secs, self.sample_rate);
    }

    /// Process a stereo sample pair
    ///
    /// # Real-time Safety
    /// No allocations, no syscalls, O(1) time.
    #[inline]
    pub fn process_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        let level = left.abs().max(right.abs()).max(DETECTOR_FLOOR);
        let input_db = 20.0 * level.log10();
        let target = self.settings.output_db(input_db) - input_db;

        // More reduction = attack, less reduction = release
        let coeff = if target < self.reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.reduction_db = coeff * self.reduction_db + (1.0 - coeff) * target;

        let gain = db_to_linear(self.reduction_db);
        (left * gain, right * gain)
    }

    /// Process an interleaved stereo buffer in-place
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_sample(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

/// One-pole smoothing coefficient for a time constant
#[inline]
fn time_coefficient(time_secs: f32, sample_rate: f32) -> f32 {
    if time_secs <= 0.0 || sample_rate <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_secs * sample_rate)).exp()
}

/// Convert decibels to linear amplitude
#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_preset_values() {
        let s = CompressorSettings::enabled();
        assert_eq!(s.threshold_db, -24.0);
        assert_eq!(s.knee_db, 30.0);
        assert_eq!(s.ratio, 12.0);
        assert_eq!(s.attack_secs, 0.003);
        assert_eq!(s.release_secs, 0.25);
    }

    #[test]
    fn test_bypass_preset_values() {
        let s = CompressorSettings::bypass();
        assert_eq!(s.threshold_db, 0.0);
        assert_eq!(s.ratio, 1.0);
    }

    #[test]
    fn test_static_curve_below_knee_is_identity() {
        let s = CompressorSettings::enabled();
        // Knee spans -39dB..-9dB
        assert_eq!(s.output_db(-60.0), -60.0);
    }

    #[test]
    fn test_static_curve_above_knee() {
        let s = CompressorSettings::enabled();
        let out = s.output_db(0.0);
        assert!((out - (-24.0 + 24.0 / 12.0)).abs() < 1e-4);
    }

    #[test]
    fn test_static_curve_continuous_at_knee_edges() {
        let s = CompressorSettings::enabled();
        let lower = -24.0 - 15.0;
        let upper = -24.0 + 15.0;
        assert!((s.output_db(lower - 0.001) - s.output_db(lower + 0.001)).abs() < 0.01);
        assert!((s.output_db(upper - 0.001) - s.output_db(upper + 0.001)).abs() < 0.01);
    }

    #[test]
    fn test_bypass_is_transparent() {
        let mut comp = Compressor::new(48000.0, CompressorSettings::bypass());
        for i in 0..1000 {
            let input = ((i as f32) * 0.05).sin() * 0.9;
            let (l, r) = comp.process_sample(input, input);
            assert!((l - input).abs() < 1e-5);
            assert!((r - input).abs() < 1e-5);
        }
    }

    #[test]
    fn test_enabled_reduces_loud_signal() {
        let mut comp = Compressor::new(48000.0, CompressorSettings::enabled());
        let mut last = 0.0;
        for _ in 0..4800 {
            let (l, _) = comp.process_sample(0.9, 0.9);
            last = l;
        }
        assert!(last < 0.5, "loud signal should be compressed: {}", last);
        assert!(comp.reduction_db() < -6.0);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut comp = Compressor::new(48000.0, CompressorSettings::enabled());
        // -60dBFS sits below the knee
        let (l, _) = comp.process_sample(0.001, 0.001);
        assert!((l - 0.001).abs() < 1e-6);
    }

    #[test]
    fn test_toggle_and_reset() {
        let mut comp = Compressor::new(48000.0, CompressorSettings::bypass());
        comp.set_enabled(true);
        assert_eq!(*comp.settings(), CompressorSettings::enabled());
        for _ in 0..1000 {
            comp.process_sample(1.0, 1.0);
        }
        comp.reset();
        assert_eq!(comp.reduction_db(), 0.0);
        comp.set_enabled(false);
        assert_eq!(*comp.settings(), CompressorSettings::bypass());
    }
}

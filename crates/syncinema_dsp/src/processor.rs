//! Audio Processor Trait
//!
//! Defines the interface shared by the chain stages so a track's chain can
//! drive them uniformly (EQ -> Compressor).

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// Trait for audio processors in a track's chain
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network)
/// - Constant or O(n) time complexity where n = buffer size
pub trait AudioProcessor: Send {
    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved: [L0, R0, L1, R1, ...]
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state (delay lines, envelopes, etc.)
    fn reset(&mut self);

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;
}

impl AudioProcessor for crate::ThreeBandEq {
    fn process(&mut self, buffer: &mut [f32], _context: &ProcessContext) {
        self.process_interleaved(buffer);
    }

    fn reset(&mut self) {
        crate::ThreeBandEq::reset(self);
    }

    fn name(&self) -> &'static str {
        "3-Band Equalizer"
    }
}

impl AudioProcessor for crate::Compressor {
    fn process(&mut self, buffer: &mut [f32], _context: &ProcessContext) {
        self.process_interleaved(buffer);
    }

    fn reset(&mut self) {
        crate::Compressor::reset(self);
    }

    fn name(&self) -> &'static str {
        "Dynamics Compressor"
    }
}

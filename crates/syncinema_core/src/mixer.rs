//! Master Volume Mixer
//!
//! One scalar multiplied into every track's effective volume. It is not a
//! node in the signal chain; it applies at the same layer as per-track
//! volume, so either can change without re-deriving the other.

/// Gain actually handed to a playback element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveVolume {
    /// `track volume * master`, kept even while muted
    pub gain: f32,
    pub muted: bool,
}

impl EffectiveVolume {
    /// Level that reaches the speakers
    pub fn audible(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.gain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterMixer {
    master: f32,
}

impl Default for MasterMixer {
    fn default() -> Self {
        Self { master: 1.0 }
    }
}

impl MasterMixer {
    pub fn new(master: f32) -> Self {
        let mut mixer = Self::default();
        mixer.set_master(master);
        mixer
    }

    pub fn master(&self) -> f32 {
        self.master
    }

    /// Set the master level, clamped to 0..=1; returns true if it changed
    pub fn set_master(&mut self, volume: f32) -> bool {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let changed = volume != self.master;
        self.master = volume;
        changed
    }

    pub fn effective(&self, track_volume: f32, muted: bool) -> EffectiveVolume {
        EffectiveVolume {
            gain: track_volume.clamp(0.0, 1.0) * self.master,
            muted,
        }
    }
}

//! Sync Engine Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and processing configuration for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Drift (seconds) above which a track is hard-seeked back to target
    pub sync_threshold_secs: f64,

    /// Minimum wall-clock gap between two corrections of the same track
    pub drift_throttle_ms: u64,

    /// Wait after an output-device change before touching playback again
    pub settle_delay_ms: u64,

    /// How long the "drift corrected" indicator stays raised
    pub drift_indicator_ms: u64,

    /// Sample rate the per-track signal chains are built for
    pub sample_rate: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_threshold_secs: 0.3,
            drift_throttle_ms: 500,
            settle_delay_ms: 500,
            drift_indicator_ms: 1500,
            sample_rate: 48000,
        }
    }
}

impl SyncConfig {
    /// Tighter sync for material with frequent cuts
    pub fn tight() -> Self {
        Self {
            sync_threshold_secs: 0.2,
            ..Default::default()
        }
    }

    /// Looser sync, fewer audible seeks on slow machines
    pub fn relaxed() -> Self {
        Self {
            sync_threshold_secs: 0.5,
            ..Default::default()
        }
    }

    pub fn drift_throttle(&self) -> Duration {
        Duration::from_millis(self.drift_throttle_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn drift_indicator(&self) -> Duration {
        Duration::from_millis(self.drift_indicator_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.05..=5.0).contains(&self.sync_threshold_secs) {
            return Err(format!(
                "Invalid sync threshold: {}s",
                self.sync_threshold_secs
            ));
        }
        if self.settle_delay_ms > 10_000 {
            return Err(format!("Invalid settle delay: {}ms", self.settle_delay_ms));
        }
        if self.drift_throttle_ms > 10_000 {
            return Err(format!(
                "Invalid drift throttle: {}ms",
                self.drift_throttle_ms
            ));
        }
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        Ok(())
    }
}

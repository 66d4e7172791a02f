//! Sync Clock Source
//!
//! The video playhead is ground truth. The shell feeds it in as
//! `ClockSignal`s: native time updates (4-10Hz), animation frames while
//! playing, and play/pause transitions. `SyncClock` folds them into the
//! current `MasterClock` and tells the engine when controllers must run.

use serde::{Deserialize, Serialize};

/// Snapshot of the master video clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterClock {
    pub current_time: f64,
    pub is_playing: bool,
    pub duration: f64,
}

impl Default for MasterClock {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            is_playing: false,
            duration: 0.0,
        }
    }
}

/// One notification from the video element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockSignal {
    /// Native time-update event; also delivered on seeks while paused
    TimeUpdate(f64),
    /// Per-frame sample, only meaningful while playing
    AnimationFrame(f64),
    /// Play or pause, with the time sampled at the transition
    PlayStateChanged { is_playing: bool, current_time: f64 },
    /// Media metadata loaded
    DurationChanged(f64),
}

/// Play-state edge carried by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTransition {
    Started,
    Stopped,
}

/// What controllers see for one accepted clock sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    pub clock: MasterClock,
    pub transition: Option<PlayTransition>,
}

impl ClockTick {
    pub fn video_time(&self) -> f64 {
        self.clock.current_time
    }
}

/// Holds the latest master clock state
#[derive(Debug, Default)]
pub struct SyncClock {
    clock: MasterClock,
}

impl SyncClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> MasterClock {
        self.clock
    }

    /// Fold a signal into the clock
    ///
    /// Returns `None` when the signal carries nothing controllers need:
    /// animation frames while paused (the paused clock is held static),
    /// repeated play-state notifications without an actual edge, and
    /// duration changes.
    pub fn apply(&mut self, signal: ClockSignal) -> Option<ClockTick> {
        match signal {
            ClockSignal::TimeUpdate(time) => {
                self.clock.current_time = sanitize_time(time);
                Some(self.tick(None))
            }
            ClockSignal::AnimationFrame(time) => {
                if !self.clock.is_playing {
                    return None;
                }
                self.clock.current_time = sanitize_time(time);
                Some(self.tick(None))
            }
            ClockSignal::PlayStateChanged {
                is_playing,
                current_time,
            } => {
                self.clock.current_time = sanitize_time(current_time);
                if is_playing == self.clock.is_playing {
                    return Some(self.tick(None));
                }
                self.clock.is_playing = is_playing;
                let transition = if is_playing {
                    PlayTransition::Started
                } else {
                    PlayTransition::Stopped
                };
                Some(self.tick(Some(transition)))
            }
            ClockSignal::DurationChanged(duration) => {
                self.clock.duration = sanitize_time(duration);
                None
            }
        }
    }

    fn tick(&self, transition: Option<PlayTransition>) -> ClockTick {
        ClockTick {
            clock: self.clock,
            transition,
        }
    }
}

fn sanitize_time(time: f64) -> f64 {
    if time.is_finite() {
        time.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_frames_ignored_while_paused() {
        let mut clock = SyncClock::new();
        assert!(clock.apply(ClockSignal::AnimationFrame(1.0)).is_none());
        assert_eq!(clock.current().current_time, 0.0);
    }

    #[test]
    fn test_time_update_while_paused_moves_clock() {
        let mut clock = SyncClock::new();
        let tick = clock.apply(ClockSignal::TimeUpdate(42.0)).unwrap();
        assert_eq!(tick.video_time(), 42.0);
        assert!(tick.transition.is_none());
        assert!(!tick.clock.is_playing);
    }

    #[test]
    fn test_play_transitions() {
        let mut clock = SyncClock::new();
        let started = clock
            .apply(ClockSignal::PlayStateChanged {
                is_playing: true,
                current_time: 0.0,
            })
            .unwrap();
        assert_eq!(started.transition, Some(PlayTransition::Started));

        let frame = clock.apply(ClockSignal::AnimationFrame(0.016)).unwrap();
        assert_eq!(frame.video_time(), 0.016);

        let repeat = clock
            .apply(ClockSignal::PlayStateChanged {
                is_playing: true,
                current_time: 0.02,
            })
            .unwrap();
        assert!(repeat.transition.is_none());

        let stopped = clock
            .apply(ClockSignal::PlayStateChanged {
                is_playing: false,
                current_time: 5.0,
            })
            .unwrap();
        assert_eq!(stopped.transition, Some(PlayTransition::Stopped));
        assert_eq!(clock.current().current_time, 5.0);
    }

    #[test]
    fn test_duration_and_bad_times() {
        let mut clock = SyncClock::new();
        assert!(clock.apply(ClockSignal::DurationChanged(120.0)).is_none());
        assert_eq!(clock.current().duration, 120.0);

        clock.apply(ClockSignal::TimeUpdate(f64::NAN));
        assert_eq!(clock.current().current_time, 0.0);
    }
}

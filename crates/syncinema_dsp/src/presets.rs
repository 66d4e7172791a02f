//! Built-in EQ Presets

use crate::eq::EqGains;

/// Named EQ preset over the three tone bands
pub type EqPreset = (&'static str, EqGains);

/// List of built-in presets
pub const PRESETS: &[EqPreset] = &[
    ("flat", EqGains::new(0.0, 0.0, 0.0)),
    ("cinema", EqGains::new(3.0, 0.0, 2.0)),
    ("dialogue", EqGains::new(-2.0, 4.0, 1.0)),
    ("music", EqGains::new(4.0, 1.0, 3.0)),
    ("night", EqGains::new(-3.0, 2.0, -1.0)), // Tame lows for late viewing
    ("bass", EqGains::new(6.0, 0.0, 0.0)),
];

/// Look up a preset by its id
pub fn preset_by_id(id: &str) -> Option<EqGains> {
    PRESETS
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, gains)| *gains)
}

/// Find the preset whose bands are exactly equal to `gains`
///
/// No tolerance: a slider nudged by 0.1dB no longer matches.
pub fn match_preset(gains: &EqGains) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(_, preset)| preset == gains)
        .map(|(name, _)| *name)
}

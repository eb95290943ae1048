//! Parameter store shared between the audio thread and control threads
//!
//! Every parameter is one `f32` held as its bit pattern in an `AtomicU32`.
//! Reads and writes are relaxed atomics: a reader always sees some complete
//! value, never a torn one, and nothing on the audio thread ever blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::dsp::{SaturationCurve, SaturationSlot};

/// Errors from parameter lookups and selections
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("{curve:?} saturation is not available on the {slot:?} stage")]
    UnsupportedChoice {
        slot: SaturationSlot,
        curve: SaturationCurve,
    },
}

pub type Result<T> = std::result::Result<T, ParamError>;

/// Identifiers of every automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamId {
    InGain,
    Drive,
    InClean,
    InWarm,
    InBright,
    OutGain,
    OutClean,
    OutWarm,
    OutThick,
    LowFreq,
    LowGain,
    LowBump,
    LowShelf,
    LowWide,
    LowMidFreq,
    LowMidGain,
    LowMidQ,
    HighMidFreq,
    HighMidGain,
    HighMidQ,
    HighFreq,
    HighGain,
    HighBump,
    HighShelf,
    HighWide,
    HighPass,
}

/// Value domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Continuous value within `[min, max]`
    Float,
    /// Toggle stored as 0.0 / 1.0
    Bool,
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub id: ParamId,
    pub label: &'static str,
    pub unit: &'static str,
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamSpec {
    const fn float(
        id: ParamId,
        label: &'static str,
        unit: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            id,
            label,
            unit,
            kind: ParamKind::Float,
            min,
            max,
            default,
        }
    }

    const fn toggle(id: ParamId, label: &'static str) -> Self {
        Self {
            id,
            label,
            unit: "",
            kind: ParamKind::Bool,
            min: 0.0,
            max: 1.0,
            default: 0.0,
        }
    }

    /// Bring a value into this parameter's domain
    pub fn clamp(&self, value: f32) -> f32 {
        match self.kind {
            ParamKind::Float => value.clamp(self.min, self.max),
            ParamKind::Bool => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

const SPECS: [ParamSpec; ParamId::COUNT] = [
    ParamSpec::float(ParamId::InGain, "Gain", "dB", -12.0, 12.0, 0.0),
    ParamSpec::float(ParamId::Drive, "Drive", "dB", -12.0, 12.0, 0.0),
    ParamSpec::toggle(ParamId::InClean, "Input Clean"),
    ParamSpec::toggle(ParamId::InWarm, "Input Warm"),
    ParamSpec::toggle(ParamId::InBright, "Input Bright"),
    ParamSpec::float(ParamId::OutGain, "Output", "dB", -12.0, 12.0, 0.0),
    ParamSpec::toggle(ParamId::OutClean, "Output Clean"),
    ParamSpec::toggle(ParamId::OutWarm, "Output Warm"),
    ParamSpec::toggle(ParamId::OutThick, "Output Thick"),
    ParamSpec::float(ParamId::LowFreq, "Low Freq", "Hz", 20.0, 220.0, 100.0),
    ParamSpec::float(ParamId::LowGain, "Low Gain", "dB", -20.0, 20.0, 0.0),
    ParamSpec::toggle(ParamId::LowBump, "Low Bump"),
    ParamSpec::toggle(ParamId::LowShelf, "Low Normal"),
    ParamSpec::toggle(ParamId::LowWide, "Low Wide"),
    ParamSpec::float(ParamId::LowMidFreq, "Low Mid Freq", "Hz", 220.0, 3600.0, 400.0),
    ParamSpec::float(ParamId::LowMidGain, "Low Mid Gain", "dB", -20.0, 20.0, 0.0),
    ParamSpec::float(ParamId::LowMidQ, "Low Mid Resonance", "", 0.2, 4.0, 0.7),
    ParamSpec::float(ParamId::HighMidFreq, "High Mid Freq", "Hz", 1000.0, 6000.0, 2000.0),
    ParamSpec::float(ParamId::HighMidGain, "High Mid Gain", "dB", -20.0, 20.0, 0.0),
    ParamSpec::float(ParamId::HighMidQ, "High Mid Resonance", "", 0.2, 4.0, 0.7),
    ParamSpec::float(ParamId::HighFreq, "High Freq", "Hz", 4000.0, 20000.0, 4000.0),
    ParamSpec::float(ParamId::HighGain, "High Gain", "dB", -20.0, 20.0, 0.0),
    ParamSpec::toggle(ParamId::HighBump, "High Bump"),
    ParamSpec::toggle(ParamId::HighShelf, "High Normal"),
    ParamSpec::toggle(ParamId::HighWide, "High Wide"),
    ParamSpec::float(ParamId::HighPass, "High Pass", "Hz", 20.0, 250.0, 20.0),
];

impl ParamId {
    pub const COUNT: usize = 26;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::InGain,
        ParamId::Drive,
        ParamId::InClean,
        ParamId::InWarm,
        ParamId::InBright,
        ParamId::OutGain,
        ParamId::OutClean,
        ParamId::OutWarm,
        ParamId::OutThick,
        ParamId::LowFreq,
        ParamId::LowGain,
        ParamId::LowBump,
        ParamId::LowShelf,
        ParamId::LowWide,
        ParamId::LowMidFreq,
        ParamId::LowMidGain,
        ParamId::LowMidQ,
        ParamId::HighMidFreq,
        ParamId::HighMidGain,
        ParamId::HighMidQ,
        ParamId::HighFreq,
        ParamId::HighGain,
        ParamId::HighBump,
        ParamId::HighShelf,
        ParamId::HighWide,
        ParamId::HighPass,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Stable external identifier, as used in state documents and the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            ParamId::InGain => "INGAIN",
            ParamId::Drive => "DRIVE",
            ParamId::InClean => "INCLEAN",
            ParamId::InWarm => "INWARM",
            ParamId::InBright => "INBRIGHT",
            ParamId::OutGain => "OUTGAIN",
            ParamId::OutClean => "OUTCLEAN",
            ParamId::OutWarm => "OUTWARM",
            ParamId::OutThick => "OUTTHICK",
            ParamId::LowFreq => "LOWFREQ",
            ParamId::LowGain => "LOWGAIN",
            ParamId::LowBump => "LOWBUMP",
            ParamId::LowShelf => "LOWSHELF",
            ParamId::LowWide => "LOWWIDE",
            ParamId::LowMidFreq => "LOWMIDFREQ",
            ParamId::LowMidGain => "LOWMIDGAIN",
            ParamId::LowMidQ => "LOWMIDQ",
            ParamId::HighMidFreq => "HIGHMIDFREQ",
            ParamId::HighMidGain => "HIGHMIDGAIN",
            ParamId::HighMidQ => "HIGHMIDQ",
            ParamId::HighFreq => "HIGHFREQ",
            ParamId::HighGain => "HIGHGAIN",
            ParamId::HighBump => "HIGHBUMP",
            ParamId::HighShelf => "HIGHSHELF",
            ParamId::HighWide => "HIGHWIDE",
            ParamId::HighPass => "HIGHPASS",
        }
    }

    pub fn spec(self) -> &'static ParamSpec {
        &SPECS[self.index()]
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParamError::UnknownParameter(s.to_string()))
    }
}

/// EQ band with a switchable shelf character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Low,
    High,
}

/// Shelf character selected by a band's radio group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShelfMode {
    /// Resonant shelf with a bump near the corner
    Bump,
    /// Plain shelf
    Shelf,
    /// Gentle, wide transition
    Wide,
}

impl Band {
    fn flags(self) -> [(ShelfMode, ParamId); 3] {
        match self {
            Band::Low => [
                (ShelfMode::Bump, ParamId::LowBump),
                (ShelfMode::Shelf, ParamId::LowShelf),
                (ShelfMode::Wide, ParamId::LowWide),
            ],
            Band::High => [
                (ShelfMode::Bump, ParamId::HighBump),
                (ShelfMode::Shelf, ParamId::HighShelf),
                (ShelfMode::Wide, ParamId::HighWide),
            ],
        }
    }
}

fn saturation_flags(slot: SaturationSlot) -> [(SaturationCurve, ParamId); 3] {
    match slot {
        SaturationSlot::Input => [
            (SaturationCurve::Clean, ParamId::InClean),
            (SaturationCurve::Warm, ParamId::InWarm),
            (SaturationCurve::Bright, ParamId::InBright),
        ],
        SaturationSlot::Output => [
            (SaturationCurve::Clean, ParamId::OutClean),
            (SaturationCurve::Warm, ParamId::OutWarm),
            (SaturationCurve::Thick, ParamId::OutThick),
        ],
    }
}

/// Serializable parameter values keyed by external identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterState {
    values: BTreeMap<String, f32>,
}

impl ParameterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lock-free storage for every parameter of the strip
///
/// Shared behind an `Arc`: control threads write, the audio thread reads
/// once per block.
#[derive(Debug)]
pub struct ParameterStore {
    values: [AtomicU32; ParamId::COUNT],
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicU32::new(SPECS[i].default.to_bits())),
        }
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get(id) >= 0.5
    }

    /// Store a value, clamped into the parameter's range
    ///
    /// Non-finite values are ignored.
    pub fn set(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }
        let value = id.spec().clamp(value);
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_bool(&self, id: ParamId, on: bool) {
        self.set(id, if on { 1.0 } else { 0.0 });
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<()> {
        let id: ParamId = name.parse()?;
        self.set(id, value);
        Ok(())
    }

    /// Turn one saturation radio button on and its siblings off
    pub fn select_saturation(&self, slot: SaturationSlot, curve: SaturationCurve) -> Result<()> {
        let flags = saturation_flags(slot);
        if !flags.iter().any(|(c, _)| *c == curve) {
            return Err(ParamError::UnsupportedChoice { slot, curve });
        }
        for (c, id) in flags {
            self.set_bool(id, c == curve);
        }
        Ok(())
    }

    /// Curve a saturation stage should use
    ///
    /// Clean wins over warm; with neither set the stage falls back to its
    /// character curve (bright on the input, thick on the output).
    pub fn saturation_curve(&self, slot: SaturationSlot) -> SaturationCurve {
        let [(_, clean), (_, warm), (fallback, _)] = saturation_flags(slot);
        if self.get_bool(clean) {
            SaturationCurve::Clean
        } else if self.get_bool(warm) {
            SaturationCurve::Warm
        } else {
            fallback
        }
    }

    /// Turn one shelf radio button on and its siblings off
    pub fn select_shelf_mode(&self, band: Band, mode: ShelfMode) {
        for (m, id) in band.flags() {
            self.set_bool(id, m == mode);
        }
    }

    /// Shelf character of a band; bump wins over wide, wide over shelf
    pub fn shelf_mode(&self, band: Band) -> ShelfMode {
        let [(_, bump), _, (_, wide)] = band.flags();
        if self.get_bool(bump) {
            ShelfMode::Bump
        } else if self.get_bool(wide) {
            ShelfMode::Wide
        } else {
            ShelfMode::Shelf
        }
    }

    /// Copy every value into a serializable map
    pub fn snapshot(&self) -> ParameterState {
        let mut state = ParameterState::new();
        for id in ParamId::ALL {
            state.insert(id.as_str(), self.get(id));
        }
        state
    }

    /// Apply a saved map; returns how many values were applied
    ///
    /// Unknown names are skipped with a warning and missing names keep
    /// their current value.
    pub fn restore(&self, state: &ParameterState) -> usize {
        let mut applied = 0;
        for (name, value) in state.iter() {
            match name.parse::<ParamId>() {
                Ok(id) => {
                    self.set(id, value);
                    applied += 1;
                }
                Err(_) => warn!(name, "Ignoring unknown parameter in saved state"),
            }
        }
        debug!(applied, total = state.len(), "Parameter state restored");
        applied
    }

    pub fn reset_to_defaults(&self) {
        for id in ParamId::ALL {
            self.set(id, id.spec().default);
        }
    }
}
